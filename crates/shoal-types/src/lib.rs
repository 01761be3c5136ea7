//! Pure data types for shoal: runtime values, static types, the environment table.
//!
//! This crate is a leaf dependency with no async runtime, no parser, no I/O
//! beyond the one-time environment snapshot. The kernel treats values
//! opaquely except for their type tag, their representation, and the
//! string-scalar variant.

pub mod env;
pub mod value;

pub use env::{Env, DEFAULT_SEARCH_PATH};
pub use value::{value_to_json, Type, Value};
