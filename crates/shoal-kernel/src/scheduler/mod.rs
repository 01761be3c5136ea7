//! Scheduler: pipelines and background jobs.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                        PipelineOp                         │
//! │  ┌─────────┐  pipe_stream  ┌─────────┐  pipe_stream  ┌───┐│
//! │  │ stage 1 │──────────────▶│ stage 2 │──────────────▶│ 3 ││
//! │  │ (task)  │ port 1→port 0 │ (task)  │ port 1→port 0 │   ││
//! │  └─────────┘               └─────────┘               └───┘│
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! Each stage runs in its own evaluator copy on its own tokio task. A
//! trailing `&` moves the whole pipeline onto a job task that owns the
//! parent's ports; the [`JobManager`] keeps its handle until it is waited
//! for.

mod job;
mod pipeline;
pub mod pipe_stream;

pub use job::{JobId, JobInfo, JobManager, JobStatus};
pub use pipe_stream::{pipe_stream, PipeReader, PipeWriter, PIPE_BUFFER_SIZE};
pub(crate) use pipeline::PipelineOp;
