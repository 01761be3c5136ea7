//! shoal-kernel: the evaluation runtime of the shoal shell.
//!
//! This crate provides:
//!
//! - **Lexer**: Tokenizes shoal source code using logos
//! - **Parser**: Builds the AST from tokens using chumsky
//! - **Compiler**: Static checks, then a tree of executable ops
//! - **Interpreter**: The evaluator, its port table, scope and status policy
//! - **Scheduler**: Pipelines over bounded in-memory pipes, background jobs
//! - **Tools**: Tool trait, registry, builtins and external programs
//!
//! ```no_run
//! # async fn demo() -> Result<(), shoal_kernel::EvalError> {
//! let mut ev = shoal_kernel::Evaluator::new();
//! ev.eval_source("[demo]", "echo hello | cat").await?;
//! # Ok(())
//! # }
//! ```

pub mod ast;
pub mod compiler;
pub mod config;
pub mod diag;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod scheduler;
pub mod tools;

pub use ast::MAX_PORTS;
pub use config::{EnvSource, EvaluatorConfig};
pub use diag::ContextualError;
pub use interpreter::{Channel, EvalError, EvalResult, Evaluator, MemoryChannel, Port, Scope};
pub use parser::parse;
pub use scheduler::{JobId, JobInfo, JobManager, JobStatus};

pub use shoal_types::{Env, Type, Value};
