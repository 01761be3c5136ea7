//! Runtime state: evaluator, scope, ports and status reporting.

mod error;
mod evaluator;
mod port;
mod scope;
mod status;

pub use error::{EvalError, EvalResult};
pub use evaluator::Evaluator;
pub use port::{Channel, Handle, MemoryChannel, Port};
pub use scope::{Cell, Scope};
pub use status::{default_status_callback, render_status, status_ok, StatusCallback};
