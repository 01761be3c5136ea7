//! Exit-status policy.
//!
//! A form yields a status value; an empty string means success. After each
//! top-level pipeline the statuses of its forms are checked, and anything
//! other than all-success is handed to the status callback.

use std::io::Write;
use std::sync::Arc;

use shoal_types::Value;

/// Receives the statuses of a pipeline that did not fully succeed.
pub type StatusCallback = Arc<dyn Fn(&[Value]) + Send + Sync>;

/// True when every status is the empty string.
pub fn status_ok(statuses: &[Value]) -> bool {
    statuses
        .iter()
        .all(|v| matches!(v, Value::String(s) if s.is_empty()))
}

/// `Status: a, b` using the quoted representation of each value.
pub fn render_status(statuses: &[Value]) -> String {
    let parts: Vec<String> = statuses.iter().map(Value::repr).collect();
    format!("Status: {}", parts.join(", "))
}

/// Writes the rendered status line to the host's stderr.
pub fn default_status_callback() -> StatusCallback {
    Arc::new(|statuses: &[Value]| {
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(stderr, "{}", render_status(statuses));
    })
}
