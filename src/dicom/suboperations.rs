//! Sub-operation iterator driving C-MOVE/C-GET: a lazy, single-pass,
//! cancellable sequence producing one outcome per step, with the total
//! count known up front.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::jobs::StopOnFailure;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubOperationOutcome {
    Success,
    Warning(String),
    Failure(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubOperationCounters {
    pub completed: u32,
    pub failed: u32,
    pub warnings: u32,
    pub remaining: u32,
}

/// One step of work: push a single resolved instance to its destination
/// (C-MOVE: a fresh outbound association; C-GET: the requesting
/// association). The dispatcher supplies the concrete implementation.
#[async_trait]
pub trait SubOperation: Send + Sync {
    async fn perform(&self, instance_id: &str) -> SubOperationOutcome;
}

pub struct SubOperationPump<O: SubOperation> {
    operation: O,
    instance_ids: Vec<String>,
    cursor: usize,
    cancelled: Arc<AtomicBool>,
    stop_on_failure: StopOnFailure,
    counters: SubOperationCounters,
}

pub enum PumpStep {
    Outcome(SubOperationOutcome),
    Cancelled,
    Stopped,
    Done,
}

impl<O: SubOperation> SubOperationPump<O> {
    pub fn new(operation: O, instance_ids: Vec<String>, stop_on_failure: StopOnFailure) -> Self {
        let remaining = instance_ids.len() as u32;
        Self {
            operation,
            instance_ids,
            cursor: 0,
            cancelled: Arc::new(AtomicBool::new(false)),
            stop_on_failure,
            counters: SubOperationCounters {
                remaining,
                ..Default::default()
            },
        }
    }

    /// Total count, known before the first `do_next` call.
    pub fn total(&self) -> u32 {
        self.instance_ids.len() as u32
    }

    pub fn counters(&self) -> SubOperationCounters {
        self.counters
    }

    pub fn cancellation_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// The instance id the most recently returned outcome refers to, if
    /// any step has run yet.
    pub fn last_instance_id(&self) -> Option<&str> {
        self.cursor
            .checked_sub(1)
            .and_then(|i| self.instance_ids.get(i))
            .map(String::as_str)
    }

    /// Drives exactly one step. Returns `PumpStep::Done` once every
    /// instance has been processed, and `PumpStep::Stopped` when a
    /// strict pump observes a failure and gives up early.
    pub async fn do_next(&mut self) -> PumpStep {
        if self.cancelled.load(Ordering::SeqCst) {
            return PumpStep::Cancelled;
        }
        if self.cursor >= self.instance_ids.len() {
            return PumpStep::Done;
        }

        let instance_id = &self.instance_ids[self.cursor];
        let outcome = self.operation.perform(instance_id).await;
        self.cursor += 1;
        self.counters.remaining = self.counters.remaining.saturating_sub(1);

        match &outcome {
            SubOperationOutcome::Success => self.counters.completed += 1,
            SubOperationOutcome::Warning(_) => {
                self.counters.completed += 1;
                self.counters.warnings += 1;
            }
            SubOperationOutcome::Failure(_) => {
                self.counters.failed += 1;
                if self.stop_on_failure == StopOnFailure::Strict {
                    return PumpStep::Stopped;
                }
            }
        }

        PumpStep::Outcome(outcome)
    }

    /// Drains the pump to completion (or cancellation/strict-stop),
    /// returning the final counters.
    pub async fn run_to_completion(&mut self) -> SubOperationCounters {
        loop {
            match self.do_next().await {
                PumpStep::Outcome(_) => continue,
                PumpStep::Cancelled | PumpStep::Stopped | PumpStep::Done => break,
            }
        }
        self.counters
    }
}
