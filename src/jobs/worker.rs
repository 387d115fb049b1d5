//! Worker pool driving submitted jobs through their `Job::step()` state
//! machine, with exponential-backoff retry and (by default) permissive
//! continuation past a single job's failure.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use uuid::Uuid;

use super::job::{Job, JobProgress, StepOutcome, StopOnFailure};
use super::queue::JobQueue;
use super::retry::RetryPolicy;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    Retrying { attempt: u32, reason: String },
    Success,
    Failure(String),
}

struct JobRecord {
    job: Box<dyn Job>,
    status: JobStatus,
    attempt: u32,
}

/// Shared state for the job engine: the pending-work queue plus the
/// in-memory record of every job ever submitted (for status/progress
/// lookups). Threaded through `ServerContext` as an `Arc`, never a
/// process-wide singleton.
pub struct JobManager {
    records: Mutex<HashMap<Uuid, JobRecord>>,
    queue: Mutex<JobQueue>,
    retry_policy: RetryPolicy,
    stop_on_failure: StopOnFailure,
    notify: Notify,
}

impl JobManager {
    pub fn new(retry_policy: RetryPolicy, stop_on_failure: StopOnFailure) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            queue: Mutex::new(JobQueue::new()),
            retry_policy,
            stop_on_failure,
            notify: Notify::new(),
        }
    }

    pub async fn submit(&self, job: Box<dyn Job>, priority: i32) -> Uuid {
        let id = Uuid::new_v4();
        let record = JobRecord {
            job,
            status: JobStatus::Pending,
            attempt: 0,
        };
        self.records.lock().await.insert(id, record);
        self.queue.lock().await.push(id, priority);
        self.notify.notify_one();
        id
    }

    pub async fn status(&self, id: Uuid) -> Option<JobStatus> {
        self.records.lock().await.get(&id).map(|r| r.status.clone())
    }

    pub async fn progress(&self, id: Uuid) -> Option<JobProgress> {
        self.records.lock().await.get(&id).map(|r| r.job.progress())
    }

    pub async fn pending_count(&self) -> usize {
        self.queue.lock().await.len()
    }

    async fn pop_next(&self) -> Option<Uuid> {
        self.queue.lock().await.pop()
    }

    /// Drives one job to completion (success, terminal failure, or a
    /// backoff sleep followed by requeue), matching
    /// `SetOfCommandsJob::Step()`'s Continue/Success/Failure/Retry cases.
    async fn run_one(&self, id: Uuid) {
        loop {
            let outcome = {
                let mut records = self.records.lock().await;
                let Some(record) = records.get_mut(&id) else {
                    return;
                };
                record.status = JobStatus::Running;
                record.job.step().await
            };

            match outcome {
                StepOutcome::Continue => continue,
                StepOutcome::Success => {
                    if let Some(record) = self.records.lock().await.get_mut(&id) {
                        record.status = JobStatus::Success;
                    }
                    return;
                }
                StepOutcome::Failure(reason) => {
                    if let Some(record) = self.records.lock().await.get_mut(&id) {
                        record.status = JobStatus::Failure(reason.clone());
                    }
                    if self.stop_on_failure == StopOnFailure::Strict {
                        tracing::warn!(job_id = %id, reason, "job failed, strict mode");
                    }
                    return;
                }
                StepOutcome::Retry(reason) => {
                    let attempt = {
                        let mut records = self.records.lock().await;
                        let Some(record) = records.get_mut(&id) else {
                            return;
                        };
                        record.attempt += 1;
                        record.status = JobStatus::Retrying {
                            attempt: record.attempt,
                            reason: reason.clone(),
                        };
                        record.attempt
                    };
                    let delay = self.retry_policy.delay_for_attempt(attempt);
                    tracing::debug!(job_id = %id, attempt, delay_ms = delay.as_millis() as u64, "retrying job");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Runs the dispatch loop for one worker: pop a job, drive it to
    /// completion, repeat. Exits only if `notified` never fires again,
    /// which in practice means until the manager is dropped.
    async fn worker_loop(self: Arc<Self>) {
        loop {
            match self.pop_next().await {
                Some(id) => self.run_one(id).await,
                None => {
                    self.notify.notified().await;
                }
            }
        }
    }

    /// Spawns `worker_count` background tasks pulling from the shared
    /// queue; returns their join handles so callers can await a clean
    /// shutdown if desired.
    pub fn spawn_workers(self: &Arc<Self>, worker_count: usize) -> Vec<tokio::task::JoinHandle<()>> {
        (0..worker_count.max(1))
            .map(|_| {
                let manager = Arc::clone(self);
                tokio::spawn(manager.worker_loop())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingJob {
        remaining: u32,
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl Job for CountingJob {
        fn job_type(&self) -> &'static str {
            "counting"
        }

        async fn step(&mut self) -> StepOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.remaining == 0 {
                return StepOutcome::Success;
            }
            self.remaining -= 1;
            StepOutcome::Continue
        }

        fn progress(&self) -> JobProgress {
            JobProgress {
                completed: 0,
                total: 0,
            }
        }

        fn serialize(&self) -> Value {
            json!({ "remaining": self.remaining })
        }
    }

    struct AlwaysFailJob;

    #[async_trait]
    impl Job for AlwaysFailJob {
        fn job_type(&self) -> &'static str {
            "always_fail"
        }

        async fn step(&mut self) -> StepOutcome {
            StepOutcome::Failure("boom".to_string())
        }

        fn progress(&self) -> JobProgress {
            JobProgress {
                completed: 0,
                total: 1,
            }
        }

        fn serialize(&self) -> Value {
            Value::Null
        }
    }

    #[tokio::test]
    async fn submit_and_run_drives_job_to_success() {
        let manager = Arc::new(JobManager::new(
            RetryPolicy::new(Duration::from_millis(1), Duration::from_millis(10)),
            StopOnFailure::Permissive,
        ));
        let calls = Arc::new(AtomicU32::new(0));
        let id = manager
            .submit(
                Box::new(CountingJob {
                    remaining: 3,
                    calls: Arc::clone(&calls),
                }),
                0,
            )
            .await;
        let popped = manager.pop_next().await.unwrap();
        assert_eq!(popped, id);
        manager.run_one(popped).await;
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(manager.status(id).await, Some(JobStatus::Success));
    }

    #[tokio::test]
    async fn failing_job_records_failure_status() {
        let manager = Arc::new(JobManager::new(
            RetryPolicy::new(Duration::from_millis(1), Duration::from_millis(10)),
            StopOnFailure::Permissive,
        ));
        let id = manager.submit(Box::new(AlwaysFailJob), 0).await;
        let popped = manager.pop_next().await.unwrap();
        manager.run_one(popped).await;
        assert_eq!(
            manager.status(id).await,
            Some(JobStatus::Failure("boom".to_string()))
        );
    }

    #[tokio::test]
    async fn pending_count_reflects_queue_depth() {
        let manager = Arc::new(JobManager::new(
            RetryPolicy::new(Duration::from_millis(1), Duration::from_millis(10)),
            StopOnFailure::Permissive,
        ));
        manager
            .submit(
                Box::new(CountingJob {
                    remaining: 0,
                    calls: Arc::new(AtomicU32::new(0)),
                }),
                0,
            )
            .await;
        assert_eq!(manager.pending_count().await, 1);
    }
}
