//! Evaluator configuration.
//!
//! Everything that differs between a REPL on a real terminal and an
//! evaluator embedded in a test lives here: where the environment comes
//! from, the fallback search path, pipe sizing and status reporting.

use std::sync::Arc;

use shoal_types::{Value, DEFAULT_SEARCH_PATH};

use crate::interpreter::StatusCallback;
use crate::scheduler::PIPE_BUFFER_SIZE;

/// Where the evaluator's environment mirror is filled from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvSource {
    /// Snapshot the host process environment at construction.
    Host,
    /// A fixed set of variables; the host environment is ignored.
    Fixed(Vec<(String, String)>),
}

/// Configuration for constructing an [`Evaluator`](crate::Evaluator).
#[derive(Clone)]
pub struct EvaluatorConfig {
    pub env_source: EnvSource,

    /// Search path used when the environment has no `PATH`.
    pub default_search_path: String,

    /// Capacity in bytes of each pipe between pipeline stages.
    pub pipe_buffer_size: usize,

    /// Replaces the default "print non-success statuses to stderr".
    pub status_callback: Option<StatusCallback>,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self::host()
    }
}

impl EvaluatorConfig {
    /// Read the host environment; report statuses on stderr.
    pub fn host() -> Self {
        Self {
            env_source: EnvSource::Host,
            default_search_path: DEFAULT_SEARCH_PATH.to_string(),
            pipe_buffer_size: PIPE_BUFFER_SIZE,
            status_callback: None,
        }
    }

    /// Start from an empty environment. Useful for tests and embedding.
    pub fn isolated() -> Self {
        Self {
            env_source: EnvSource::Fixed(Vec::new()),
            ..Self::host()
        }
    }

    pub fn with_env<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.env_source = EnvSource::Fixed(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    pub fn with_default_search_path(mut self, path: impl Into<String>) -> Self {
        self.default_search_path = path.into();
        self
    }

    pub fn with_pipe_buffer_size(mut self, size: usize) -> Self {
        self.pipe_buffer_size = size.max(1);
        self
    }

    pub fn with_status_callback(mut self, callback: impl Fn(&[Value]) + Send + Sync + 'static) -> Self {
        self.status_callback = Some(Arc::new(callback));
        self
    }
}

impl std::fmt::Debug for EvaluatorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvaluatorConfig")
            .field("env_source", &self.env_source)
            .field("default_search_path", &self.default_search_path)
            .field("pipe_buffer_size", &self.pipe_buffer_size)
            .field("status_callback", &self.status_callback.as_ref().map(|_| "custom"))
            .finish()
    }
}
