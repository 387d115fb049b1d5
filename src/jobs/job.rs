//! The `Job` trait and the per-step outcome the worker pool reacts to.

use async_trait::async_trait;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Progress was made; call `step` again.
    Continue,
    Success,
    Failure(String),
    /// Transient failure; retry after the backoff delay.
    Retry(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobProgress {
    pub completed: u32,
    pub total: u32,
}

impl JobProgress {
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

/// Whether a job continues past a sub-operation failure. Defaults to
/// permissive: a single failed instance does not abort the whole job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOnFailure {
    Permissive,
    Strict,
}

#[async_trait]
pub trait Job: Send + Sync {
    /// Stable tag used by the unserializer registry to reconstruct this
    /// job type from its `serialize()` output after a restart.
    fn job_type(&self) -> &'static str;

    async fn step(&mut self) -> StepOutcome;

    fn progress(&self) -> JobProgress;

    fn serialize(&self) -> Value;
}
