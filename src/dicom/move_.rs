//! C-MOVE: resolve the destination modality, expand the matched
//! resources to their constituent instances, and drive a sub-operation
//! pump that pushes each instance out — synchronously or as a submitted
//! job, per `dicom.synchronous_move` (defaults to asynchronous).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::config::RemoteModality;
use crate::error::{CoreError, Result};
use crate::index::{Index, QueryLevel, Tags};
use crate::jobs::{Job, JobManager, JobProgress, StepOutcome, StopOnFailure};

use super::matcher::Matcher;
use super::suboperations::{PumpStep, SubOperation, SubOperationCounters, SubOperationOutcome, SubOperationPump};

/// The outbound push itself is toolkit territory (PDU negotiation,
/// association setup) — an opaque collaborator behind this trait, the
/// same way the rest of the crate treats the DICOM toolkit.
#[async_trait]
pub trait OutboundAssociation: Send + Sync {
    async fn push(&self, destination: &RemoteModality, instance_id: &str) -> Result<()>;
}

struct RemotePush {
    destination: RemoteModality,
    association: Arc<dyn OutboundAssociation>,
}

#[async_trait]
impl SubOperation for RemotePush {
    async fn perform(&self, instance_id: &str) -> SubOperationOutcome {
        match self.association.push(&self.destination, instance_id).await {
            Ok(()) => SubOperationOutcome::Success,
            Err(e) => SubOperationOutcome::Failure(e.to_string()),
        }
    }
}

pub struct MoveRequest {
    pub level: QueryLevel,
    pub query: Tags,
    pub destination_aet: String,
}

pub enum MoveDispatch {
    SubmittedAsJob(Uuid),
    Completed(SubOperationCounters),
}

struct MoveJob {
    destination_aet: String,
    pump: SubOperationPump<RemotePush>,
}

#[async_trait]
impl Job for MoveJob {
    fn job_type(&self) -> &'static str {
        "dicom_move"
    }

    async fn step(&mut self) -> StepOutcome {
        match self.pump.do_next().await {
            PumpStep::Outcome(_) => StepOutcome::Continue,
            PumpStep::Done => StepOutcome::Success,
            PumpStep::Cancelled => StepOutcome::Failure("cancelled".to_string()),
            PumpStep::Stopped => StepOutcome::Failure("stopped after sub-operation failure".to_string()),
        }
    }

    fn progress(&self) -> JobProgress {
        let counters = self.pump.counters();
        JobProgress {
            completed: counters.completed + counters.failed,
            total: self.pump.total(),
        }
    }

    fn serialize(&self) -> Value {
        let counters = self.pump.counters();
        json!({
            "destination_aet": self.destination_aet,
            "remaining": counters.remaining,
            "completed": counters.completed,
            "failed": counters.failed,
        })
    }
}

pub async fn handle_move(
    index: &dyn Index,
    modalities: &HashMap<String, RemoteModality>,
    association: Arc<dyn OutboundAssociation>,
    jobs: &JobManager,
    synchronous: bool,
    stop_on_failure: StopOnFailure,
    request: MoveRequest,
) -> Result<MoveDispatch> {
    let destination = modalities.get(&request.destination_aet).cloned().ok_or_else(|| {
        CoreError::UnknownResource(format!("unknown destination AET '{}'", request.destination_aet))
    })?;

    let matcher = Matcher::from_query(&request.query);
    let matched_ids = index.apply(request.level, &matcher).await;

    let mut instance_ids = Vec::new();
    for id in matched_ids {
        instance_ids.extend(expand_to_instances(index, &id).await);
    }

    let pump = SubOperationPump::new(
        RemotePush {
            destination,
            association,
        },
        instance_ids,
        stop_on_failure,
    );

    if synchronous {
        let mut pump = pump;
        let counters = pump.run_to_completion().await;
        Ok(MoveDispatch::Completed(counters))
    } else {
        let job = MoveJob {
            destination_aet: request.destination_aet,
            pump,
        };
        let id = jobs.submit(Box::new(job), 0).await;
        Ok(MoveDispatch::SubmittedAsJob(id))
    }
}

/// Leaf-instance expansion via depth-first traversal of the Index's
/// children, iterative to avoid recursive `async fn` indirection.
async fn expand_to_instances(index: &dyn Index, resource_id: &str) -> Vec<String> {
    let mut stack = vec![resource_id.to_string()];
    let mut instances = Vec::new();
    while let Some(id) = stack.pop() {
        let children = index.children(&id).await;
        if children.is_empty() {
            instances.push(id);
        } else {
            stack.extend(children);
        }
    }
    instances
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::InMemoryIndex;
    use crate::jobs::RetryPolicy;
    use std::time::Duration;

    struct AlwaysSucceeds;

    #[async_trait]
    impl OutboundAssociation for AlwaysSucceeds {
        async fn push(&self, _destination: &RemoteModality, _instance_id: &str) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn unknown_destination_aet_is_an_error() {
        let index = InMemoryIndex::new();
        let jobs = JobManager::new(
            RetryPolicy::new(Duration::from_millis(1), Duration::from_millis(10)),
            StopOnFailure::Permissive,
        );
        let request = MoveRequest {
            level: QueryLevel::Instance,
            query: Tags::new(),
            destination_aet: "NOWHERE".to_string(),
        };
        let result = handle_move(
            &index,
            &HashMap::new(),
            Arc::new(AlwaysSucceeds),
            &jobs,
            true,
            StopOnFailure::Permissive,
            request,
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn synchronous_move_completes_inline() {
        let index = InMemoryIndex::new();
        let mut tags = Tags::new();
        tags.insert("PatientID".to_string(), "A1".to_string());
        index.insert_instance("inst-a", tags, None).await;

        let mut modalities = HashMap::new();
        modalities.insert(
            "REMOTE".to_string(),
            RemoteModality {
                aet: "REMOTE".to_string(),
                host: "127.0.0.1".to_string(),
                port: 11112,
            },
        );

        let jobs = JobManager::new(
            RetryPolicy::new(Duration::from_millis(1), Duration::from_millis(10)),
            StopOnFailure::Permissive,
        );
        let mut query = Tags::new();
        query.insert("PatientID".to_string(), "A1".to_string());
        let request = MoveRequest {
            level: QueryLevel::Instance,
            query,
            destination_aet: "REMOTE".to_string(),
        };

        let dispatch = handle_move(
            &index,
            &modalities,
            Arc::new(AlwaysSucceeds),
            &jobs,
            true,
            StopOnFailure::Permissive,
            request,
        )
        .await
        .unwrap();

        match dispatch {
            MoveDispatch::Completed(counters) => assert_eq!(counters.completed, 1),
            MoveDispatch::SubmittedAsJob(_) => panic!("expected synchronous completion"),
        }
    }
}
