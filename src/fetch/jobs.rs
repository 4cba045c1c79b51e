//! Deferred retry jobs emitted when a call is throttled.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use crate::error::{ExtDataError, Result};
use crate::ui;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryJob {
    /// What to fetch again, e.g. the URL.
    pub target: String,
    /// Unix time before which the job must not run.
    pub not_before: i64,
}

/// Where retry jobs go; the host decides when to run them.
pub trait JobQueue: Send + Sync {
    fn push(&self, job: RetryJob) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryJobQueue {
    jobs: Mutex<Vec<RetryJob>>,
}

impl MemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn jobs(&self) -> Vec<RetryJob> {
        self.jobs.lock().map(|jobs| jobs.clone()).unwrap_or_default()
    }
}

impl JobQueue for MemoryJobQueue {
    fn push(&self, job: RetryJob) -> Result<()> {
        self.jobs
            .lock()
            .map_err(|e| ExtDataError::LockError(e.to_string()))?
            .push(job);
        Ok(())
    }
}

/// Drops jobs; used when nothing will run them.
pub struct NullJobQueue;

impl JobQueue for NullJobQueue {
    fn push(&self, job: RetryJob) -> Result<()> {
        ui::verbose(&format!(
            "Dropping retry job for {} (not before {})",
            job.target, job.not_before
        ));
        Ok(())
    }
}
