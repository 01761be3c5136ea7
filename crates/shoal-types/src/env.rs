//! Environment table: a mirror of the host process environment.
//!
//! The table is filled once, when the root evaluator is created, and is
//! read-mostly afterwards. Nothing else in shoal re-reads host state.

use std::collections::BTreeMap;
use std::path::PathBuf;

/// Search path used when the environment has no `PATH` entry.
pub const DEFAULT_SEARCH_PATH: &str = "/bin";

/// Separator between entries of the `PATH` variable.
#[cfg(unix)]
const PATH_SEPARATOR: char = ':';
#[cfg(not(unix))]
const PATH_SEPARATOR: char = ';';

/// Mapping of variable name to string value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Env {
    vars: BTreeMap<String, String>,
}

impl Env {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from explicit pairs (embedding, tests).
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    /// Copy every variable of the host process into the table.
    ///
    /// Non-UTF-8 names and values are converted lossily.
    pub fn fill(&mut self) {
        for (key, value) in std::env::vars_os() {
            self.vars.insert(
                key.to_string_lossy().into_owned(),
                value.to_string_lossy().into_owned(),
            );
        }
    }

    /// Look up a variable.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Iterate over all variables in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Directories used to resolve external command names.
    ///
    /// Splits `PATH` on the platform separator. An empty entry names the
    /// current directory and comes back as `.`. Falls back to `default`
    /// when `PATH` is unset.
    pub fn search_paths(&self, default: &str) -> Vec<PathBuf> {
        match self.get("PATH") {
            Some(path) => path
                .split(PATH_SEPARATOR)
                .map(|entry| match entry {
                    "" => PathBuf::from("."),
                    dir => PathBuf::from(dir),
                })
                .collect(),
            None => vec![PathBuf::from(default)],
        }
    }
}
