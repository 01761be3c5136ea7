//! Commands: in-process builtins and external programs.
//!
//! ```text
//! command head
//! ├── registered tool? ──▶ Tool::execute (echo, cat, ...)
//! └── otherwise        ──▶ search path lookup, spawn child process
//! ```

mod builtin;
mod external;
mod registry;
mod traits;

pub use builtin::register_builtins;
pub use external::{exit_status_value, resolve_in_path, run_external};
pub use registry::ToolRegistry;
pub use traits::{Tool, ToolSchema};
