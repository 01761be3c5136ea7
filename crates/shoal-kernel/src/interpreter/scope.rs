//! Variable scope shared by an evaluator and every copy forked from it.
//!
//! Copies hold the same `Arc`, so a `var` declared in one pipeline stage
//! is visible to its siblings and to the parent once the stage finishes.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use shoal_types::{Type, Value};

/// One variable slot. Shared so a later `set` is seen by every holder.
pub type Cell = Arc<RwLock<Value>>;

/// Name to variable map, shared by reference across copies.
#[derive(Clone, Default)]
pub struct Scope {
    vars: Arc<RwLock<HashMap<String, Cell>>>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Cell>> {
        self.vars.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Cell>> {
        self.vars.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Create or replace a variable. Redeclaring gives a fresh cell.
    pub fn declare(&self, name: impl Into<String>, value: Value) -> Cell {
        let cell = Arc::new(RwLock::new(value));
        self.write().insert(name.into(), cell.clone());
        cell
    }

    /// Assign to an existing variable. Returns false if it is not declared.
    pub fn set(&self, name: &str, value: Value) -> bool {
        let Some(cell) = self.cell(name) else {
            return false;
        };
        *cell.write().unwrap_or_else(|e| e.into_inner()) = value;
        true
    }

    pub fn cell(&self, name: &str) -> Option<Cell> {
        self.read().get(name).cloned()
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        let cell = self.cell(name)?;
        let value = cell.read().unwrap_or_else(|e| e.into_inner()).clone();
        Some(value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    /// Static types of every variable, as seen by the compiler.
    pub fn types(&self) -> HashMap<String, Type> {
        self.snapshot()
            .into_iter()
            .map(|(name, value)| (name, value.type_of()))
            .collect()
    }

    /// All variables sorted by name.
    pub fn snapshot(&self) -> Vec<(String, Value)> {
        let cells: Vec<(String, Cell)> = self
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let mut vars: Vec<(String, Value)> = cells
            .into_iter()
            .map(|(k, cell)| {
                let value = cell.read().unwrap_or_else(|e| e.into_inner()).clone();
                (k, value)
            })
            .collect();
        vars.sort_by(|a, b| a.0.cmp(&b.0));
        vars
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when both handles point at the same underlying map.
    pub fn shares_with(&self, other: &Scope) -> bool {
        Arc::ptr_eq(&self.vars, &other.vars)
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        f.debug_struct("Scope").field("names", &names).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declare_then_get() {
        let scope = Scope::new();
        scope.declare("X", Value::from("1"));
        assert_eq!(scope.get("X"), Some(Value::from("1")));
        assert_eq!(scope.get("missing"), None);
    }

    #[test]
    fn set_requires_declaration() {
        let scope = Scope::new();
        assert!(!scope.set("X", Value::from("1")));
        scope.declare("X", Value::from("1"));
        assert!(scope.set("X", Value::from("2")));
        assert_eq!(scope.get("X"), Some(Value::from("2")));
    }

    #[test]
    fn clones_share_variables() {
        let scope = Scope::new();
        let other = scope.clone();
        other.declare("shared", Value::from("yes"));
        assert_eq!(scope.get("shared"), Some(Value::from("yes")));
        assert!(scope.shares_with(&other));
        assert!(!scope.shares_with(&Scope::new()));
    }

    #[test]
    fn cells_see_later_sets() {
        let scope = Scope::new();
        let cell = scope.declare("X", Value::from("a"));
        scope.set("X", Value::from("b"));
        assert_eq!(*cell.read().unwrap(), Value::from("b"));
    }

    #[test]
    fn types_reflect_values() {
        let scope = Scope::new();
        scope.declare("s", Value::from("x"));
        scope.declare("l", Value::List(vec![]));
        let types = scope.types();
        assert_eq!(types.get("s"), Some(&Type::String));
        assert_eq!(types.get("l"), Some(&Type::List));
    }

    #[test]
    fn snapshot_is_sorted() {
        let scope = Scope::new();
        scope.declare("b", Value::from("2"));
        scope.declare("a", Value::from("1"));
        let names: Vec<String> = scope.snapshot().into_iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["a", "b"]);
    }
}
