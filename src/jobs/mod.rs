//! C10 — background job engine: priority queue, worker pool, retry
//! backoff, and a per-type unserializer registry for restart persistence.

pub mod job;
pub mod queue;
pub mod registry;
pub mod retry;
pub mod worker;

pub use job::{Job, JobProgress, StepOutcome, StopOnFailure};
pub use queue::JobQueue;
pub use registry::UnserializerRegistry;
pub use retry::RetryPolicy;
pub use worker::{JobManager, JobStatus};
