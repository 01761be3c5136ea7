//! Core tool trait and schema.

use async_trait::async_trait;

use shoal_types::Value;

use crate::interpreter::{EvalResult, Evaluator};

/// Description of a tool, for `help` and the REPL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSchema {
    pub name: String,
    /// One-line description.
    pub description: String,
    /// Usage synopsis, e.g. `cat [file...]`.
    pub usage: String,
}

impl ToolSchema {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            usage: name.clone(),
            name,
            description: description.into(),
        }
    }

    pub fn usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = usage.into();
        self
    }
}

/// A command implemented in-process.
///
/// Tools read and write through the evaluator's ports and return a status
/// value: the empty string for success, anything else for failure. An `Err`
/// is an exception, not a failed status, and aborts the evaluation.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The tool's name (used for lookup).
    fn name(&self) -> &str;

    fn schema(&self) -> ToolSchema;

    async fn execute(&self, args: &[Value], ev: &mut Evaluator) -> EvalResult<Value>;
}
