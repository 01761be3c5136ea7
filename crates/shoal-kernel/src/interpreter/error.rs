//! Evaluation errors.
//!
//! Every failure during compile or execution travels as an `EvalError`
//! through `Result`; `Evaluator::eval` is the one place that stops it.

use thiserror::Error;

use crate::ast::Pos;
use crate::diag::ContextualError;

/// An error raised while parsing, compiling or running a chunk.
#[derive(Debug, Clone, Error)]
pub enum EvalError {
    /// The source text did not parse.
    #[error("parse error: {0}")]
    Parse(ContextualError),

    /// A static check rejected the chunk before anything ran.
    #[error("compile error: {0}")]
    Compile(ContextualError),

    /// Raised at run time and attributed to the innermost node in flight.
    #[error("{0}")]
    Runtime(ContextualError),

    /// Raised when no node was in flight, so there is no position.
    #[error("{0}")]
    Plain(String),
}

/// Result alias used throughout evaluation.
pub type EvalResult<T> = Result<T, EvalError>;

impl EvalError {
    /// Byte offset the error is attributed to, if any.
    pub fn position(&self) -> Option<Pos> {
        self.context().map(|c| c.pos)
    }

    /// The bare message, without location decoration.
    pub fn message(&self) -> &str {
        match self {
            EvalError::Parse(c) | EvalError::Compile(c) | EvalError::Runtime(c) => &c.message,
            EvalError::Plain(m) => m,
        }
    }

    /// Positional context, present for everything except `Plain`.
    pub fn context(&self) -> Option<&ContextualError> {
        match self {
            EvalError::Parse(c) | EvalError::Compile(c) | EvalError::Runtime(c) => Some(c),
            EvalError::Plain(_) => None,
        }
    }

    /// True when the error came from a static check or the parser.
    pub fn is_static(&self) -> bool {
        matches!(self, EvalError::Parse(_) | EvalError::Compile(_))
    }
}
