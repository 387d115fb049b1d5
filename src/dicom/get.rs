//! C-GET: like C-MOVE, except the destination is the same association
//! that issued the request. The iterator tracks failed SOP instance
//! UIDs for the final status report.

use std::sync::Arc;

use async_trait::async_trait;
use dimse::scp::GetResponder;
use dimse::types::DatasetStream;

use crate::error::Result;
use crate::index::{Index, QueryLevel, Tags};
use crate::jobs::StopOnFailure;

use super::matcher::Matcher;
use super::suboperations::{PumpStep, SubOperation, SubOperationCounters, SubOperationOutcome, SubOperationPump};

/// Resolves an instance id to a loadable dataset — the toolkit/storage
/// seam, kept opaque the way the toolkit's DICOM parsing is.
#[async_trait]
pub trait InstanceSource: Send + Sync {
    async fn load(&self, instance_id: &str) -> Result<DatasetStream>;
}

struct AssociationPush {
    source: Arc<dyn InstanceSource>,
    responder: Arc<dyn GetResponder>,
}

#[async_trait]
impl SubOperation for AssociationPush {
    async fn perform(&self, instance_id: &str) -> SubOperationOutcome {
        match self.source.load(instance_id).await {
            Ok(dataset) => match self.responder.send_instance(dataset).await {
                Ok(()) => SubOperationOutcome::Success,
                Err(e) => SubOperationOutcome::Failure(e.to_string()),
            },
            Err(e) => SubOperationOutcome::Failure(e.to_string()),
        }
    }
}

pub struct GetRequest {
    pub level: QueryLevel,
    pub query: Tags,
}

pub struct GetReport {
    pub counters: SubOperationCounters,
    pub failed_instance_ids: Vec<String>,
}

pub async fn handle_get(
    index: &dyn Index,
    source: Arc<dyn InstanceSource>,
    responder: Arc<dyn GetResponder>,
    stop_on_failure: StopOnFailure,
    request: GetRequest,
) -> GetReport {
    let matcher = Matcher::from_query(&request.query);
    let matched_ids = index.apply(request.level, &matcher).await;

    let mut instance_ids = Vec::new();
    for id in matched_ids {
        instance_ids.extend(expand_to_instances(index, &id).await);
    }

    let operation = AssociationPush { source, responder };
    let mut pump = SubOperationPump::new(operation, instance_ids, stop_on_failure);
    let mut failed_instance_ids = Vec::new();

    loop {
        match pump.do_next().await {
            PumpStep::Outcome(SubOperationOutcome::Failure(_)) => {
                if let Some(id) = pump.last_instance_id() {
                    failed_instance_ids.push(id.to_string());
                }
            }
            PumpStep::Outcome(_) => {}
            PumpStep::Cancelled | PumpStep::Stopped | PumpStep::Done => break,
        }
    }

    GetReport {
        counters: pump.counters(),
        failed_instance_ids,
    }
}

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
    use bytes::Bytes;

    struct AlwaysFails;

    #[async_trait]
    impl InstanceSource for AlwaysFails {
        async fn load(&self, _instance_id: &str) -> Result<DatasetStream> {
            Err(crate::error::CoreError::InexistentItem("missing blob".to_string()))
        }
    }

    struct NullResponder;

    #[async_trait]
    impl GetResponder for NullResponder {
        async fn send_instance(&self, _dataset: DatasetStream) -> dimse::Result<()> {
            Ok(())
        }
    }

    struct AlwaysSucceeds;

    #[async_trait]
    impl InstanceSource for AlwaysSucceeds {
        async fn load(&self, _instance_id: &str) -> Result<DatasetStream> {
            Ok(DatasetStream::from_bytes(Bytes::from_static(b"fake-dicom")))
        }
    }

    #[tokio::test]
    async fn failures_are_reported_by_instance_id() {
        let index = InMemoryIndex::new();
        index.insert_instance("inst-a", Tags::new(), None).await;

        let request = GetRequest {
            level: QueryLevel::Instance,
            query: Tags::new(),
        };
        let report = handle_get(
            &index,
            Arc::new(AlwaysFails),
            Arc::new(NullResponder),
            StopOnFailure::Permissive,
            request,
        )
        .await;

        assert_eq!(report.failed_instance_ids, vec!["inst-a".to_string()]);
        assert_eq!(report.counters.failed, 1);
    }

    #[tokio::test]
    async fn successful_pushes_report_no_failures() {
        let index = InMemoryIndex::new();
        index.insert_instance("inst-a", Tags::new(), None).await;

        let request = GetRequest {
            level: QueryLevel::Instance,
            query: Tags::new(),
        };
        let report = handle_get(
            &index,
            Arc::new(AlwaysSucceeds),
            Arc::new(NullResponder),
            StopOnFailure::Permissive,
            request,
        )
        .await;

        assert!(report.failed_instance_ids.is_empty());
        assert_eq!(report.counters.completed, 1);
    }
}
