//! Value types for shoal's runtime.

use std::fmt;
use std::sync::Arc;

use serde::{Serialize, Serializer};

use crate::env::Env;

/// A runtime datum.
///
/// The evaluator only inspects the string-scalar variant (statuses, single
/// word arguments); everything else flows through `type_of` and `repr`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    List(Vec<Value>),
    /// The environment table, shared rather than copied.
    Env(Arc<Env>),
}

/// Static type of a value, as seen by the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    String,
    List,
    Env,
    /// Not known until run time (index results, dynamic lookups).
    Any,
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Type::String => "string",
            Type::List => "list",
            Type::Env => "env",
            Type::Any => "any",
        };
        f.write_str(name)
    }
}

impl Value {
    /// Shorthand for the string-scalar variant.
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    pub fn type_of(&self) -> Type {
        match self {
            Value::String(_) => Type::String,
            Value::List(_) => Type::List,
            Value::Env(_) => Type::Env,
        }
    }

    /// Unwrap the string-scalar variant.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Human-readable representation that reads back as the same value.
    ///
    /// - strings made only of safe characters print bare
    /// - other strings are single-quoted, with `'` doubled
    /// - lists print as `[a b c]`
    pub fn repr(&self) -> String {
        match self {
            Value::String(s) => quote(s),
            Value::List(items) => {
                let inner: Vec<String> = items.iter().map(Value::repr).collect();
                format!("[{}]", inner.join(" "))
            }
            Value::Env(_) => "$env".to_string(),
        }
    }
}

/// Plain text form, used when a value is written to a byte channel.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => f.write_str(s),
            Value::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
            Value::Env(_) => f.write_str("$env"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        value_to_json(self).serialize(serializer)
    }
}

fn is_bare_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "-_./:@%+,^~*".contains(c)
}

fn quote(s: &str) -> String {
    if !s.is_empty() && s.chars().all(is_bare_char) {
        return s.to_string();
    }
    format!("'{}'", s.replace('\'', "''"))
}

/// Convert a value to JSON. Env tables become objects.
pub fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::List(items) => serde_json::Value::Array(items.iter().map(value_to_json).collect()),
        Value::Env(env) => {
            let map = env
                .iter()
                .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
                .collect();
            serde_json::Value::Object(map)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repr_bare_string() {
        assert_eq!(Value::string("hello").repr(), "hello");
        assert_eq!(Value::string("/usr/bin").repr(), "/usr/bin");
    }

    #[test]
    fn repr_quotes_when_needed() {
        assert_eq!(Value::string("").repr(), "''");
        assert_eq!(Value::string("a b").repr(), "'a b'");
        assert_eq!(Value::string("it's").repr(), "'it''s'");
    }

    #[test]
    fn repr_list() {
        let list = Value::List(vec![Value::string("a"), Value::string("b c")]);
        assert_eq!(list.repr(), "[a 'b c']");
    }

    #[test]
    fn display_is_plain_text() {
        let list = Value::List(vec![Value::string("a"), Value::string("b c")]);
        assert_eq!(list.to_string(), "a b c");
        assert_eq!(Value::string("it's").to_string(), "it's");
    }

    #[test]
    fn type_tags() {
        assert_eq!(Value::string("x").type_of(), Type::String);
        assert_eq!(Value::List(vec![]).type_of(), Type::List);
        assert_eq!(Value::Env(Arc::new(Env::new())).type_of(), Type::Env);
    }

    #[test]
    fn json_conversion() {
        let env = Env::from_pairs([("HOME", "/home/u")]);
        let value = Value::List(vec![Value::string("a"), Value::Env(Arc::new(env))]);
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, r#"["a",{"HOME":"/home/u"}]"#);
    }
}
