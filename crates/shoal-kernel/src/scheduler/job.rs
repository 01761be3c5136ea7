//! Background job management.
//!
//! Provides the `JobManager` for tracking pipelines started with `&`. A
//! job is registered before its task is spawned, so a `wait_all` issued
//! right after the pipeline returns always sees it.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::task::JoinHandle;

use shoal_types::Value;

use crate::interpreter::{status_ok, EvalError, EvalResult};

/// Unique identifier for a background job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub u64);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status of a background job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    /// Finished and every stage reported success.
    Done,
    /// Raised an error or a stage reported a failing status.
    Failed,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Running => write!(f, "Running"),
            JobStatus::Done => write!(f, "Done"),
            JobStatus::Failed => write!(f, "Failed"),
        }
    }
}

/// Information about a job for listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobInfo {
    pub id: JobId,
    /// Source text of the pipeline.
    pub command: String,
    pub status: JobStatus,
}

type JobResult = EvalResult<Vec<Value>>;

struct Job {
    command: String,
    status: JobStatus,
    /// Task handle, `None` once awaited.
    handle: Option<JoinHandle<JobResult>>,
    /// Cached result after the handle was awaited.
    result: Option<JobResult>,
}

fn status_of(result: &JobResult) -> JobStatus {
    match result {
        Ok(statuses) if status_ok(statuses) => JobStatus::Done,
        _ => JobStatus::Failed,
    }
}

/// Tracks background jobs. One manager is shared by an evaluator and all
/// of its copies.
pub struct JobManager {
    next_id: AtomicU64,
    jobs: Arc<Mutex<HashMap<JobId, Job>>>,
}

impl JobManager {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            jobs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<JobId, Job>> {
        self.jobs.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Spawn a new background job from a future.
    pub fn spawn<F>(&self, command: impl Into<String>, future: F) -> JobId
    where
        F: Future<Output = JobResult> + Send + 'static,
    {
        let id = JobId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let command = command.into();
        tracing::debug!(job = %id, %command, "job started");
        self.lock().insert(
            id,
            Job {
                command,
                status: JobStatus::Running,
                handle: None,
                result: None,
            },
        );

        let jobs = self.jobs.clone();
        let handle = tokio::spawn(async move {
            let result = future.await;
            let status = status_of(&result);
            if let Some(job) = jobs.lock().unwrap_or_else(|e| e.into_inner()).get_mut(&id) {
                job.status = status;
            }
            tracing::debug!(job = %id, %status, "job finished");
            result
        });

        if let Some(job) = self.lock().get_mut(&id) {
            job.handle = Some(handle);
        }
        id
    }

    /// Wait for a specific job to complete. `None` if there is no such job.
    pub async fn wait(&self, id: JobId) -> Option<JobResult> {
        let handle = {
            let mut jobs = self.lock();
            let job = jobs.get_mut(&id)?;
            if let Some(result) = &job.result {
                return Some(result.clone());
            }
            job.handle.take()
        };

        let result = match handle {
            Some(handle) => match handle.await {
                Ok(result) => result,
                Err(e) => Err(EvalError::Plain(format!("job {id} aborted: {e}"))),
            },
            // Another waiter holds the handle.
            None => Err(EvalError::Plain(format!("job {id} is already being waited for"))),
        };

        if let Some(job) = self.lock().get_mut(&id) {
            job.status = status_of(&result);
            job.result.get_or_insert_with(|| result.clone());
        }
        Some(result)
    }

    /// Wait until no job is running, including jobs started by jobs.
    /// Results come back in job id order; each job is reported once.
    pub async fn wait_all(&self) -> Vec<(JobId, JobResult)> {
        let mut results = Vec::new();
        loop {
            let mut pending: Vec<JobId> = self
                .lock()
                .iter()
                .filter(|(_, job)| job.handle.is_some())
                .map(|(id, _)| *id)
                .collect();
            if pending.is_empty() {
                break;
            }
            pending.sort();
            for id in pending {
                if let Some(result) = self.wait(id).await {
                    results.push((id, result));
                }
            }
        }
        results
    }

    /// List all jobs with their status, ordered by id.
    pub fn list(&self) -> Vec<JobInfo> {
        let mut jobs: Vec<JobInfo> = self
            .lock()
            .iter()
            .map(|(id, job)| JobInfo {
                id: *id,
                command: job.command.clone(),
                status: job.status,
            })
            .collect();
        jobs.sort_by_key(|info| info.id);
        jobs
    }

    pub fn running_count(&self) -> usize {
        self.lock()
            .values()
            .filter(|job| job.status == JobStatus::Running)
            .count()
    }

    /// Remove finished jobs from tracking.
    pub fn cleanup(&self) {
        self.lock().retain(|_, job| job.status == JobStatus::Running);
    }
}

impl Default for JobManager {
    fn default() -> Self {
        Self::new()
    }
}
