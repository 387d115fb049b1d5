//! C-STORE: route a received instance through the policy plane, then
//! persist it the same way HTTP uploads are persisted: toolkit parse →
//! Index insert → StorageArea put → event bus.

use uuid::Uuid;

use crate::error::Result;
use crate::events::{ChangeKind, EventBus};
use crate::index::{Index, Tags};
use crate::policy::{ReceivedInstanceFacts, ScriptHost, TransferSyntaxFilter};
use crate::storage::{StorageArea, StorageBackend};

pub struct StoreRequest {
    pub remote_aet: String,
    pub sop_instance_uid: String,
    pub sop_class_uid: String,
    pub transfer_syntax_uid: String,
    pub tags: Tags,
    pub bytes: Vec<u8>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum StoreOutcome {
    Stored { instance_id: Uuid },
    Discarded,
}

pub async fn handle_store(
    index: &dyn Index,
    storage: &dyn StorageBackend,
    script_host: &dyn ScriptHost,
    transfer_syntax_filter: &TransferSyntaxFilter,
    events: &EventBus,
    request: StoreRequest,
) -> Result<StoreOutcome> {
    if !transfer_syntax_filter.allows(&request.transfer_syntax_uid) {
        return Err(crate::error::CoreError::BadRequest(format!(
            "transfer syntax '{}' is not accepted",
            request.transfer_syntax_uid
        )));
    }

    let facts = ReceivedInstanceFacts {
        remote_aet: request.remote_aet,
        sop_class_uid: request.sop_class_uid,
    };
    if !script_host.on_received_instance(&facts).await {
        return Ok(StoreOutcome::Discarded);
    }

    let instance_id = Uuid::new_v4();
    storage.put(instance_id, "application/dicom", &request.bytes).await?;
    index.insert_instance(&request.sop_instance_uid, request.tags, None).await;
    events.publish(ChangeKind::InstanceCreated, request.sop_instance_uid).await;

    Ok(StoreOutcome::Stored { instance_id })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::InMemoryIndex;
    use crate::policy::NullScriptHost;
    use crate::storage::FilesystemStorage;
    use tempfile::TempDir;

    fn request() -> StoreRequest {
        StoreRequest {
            remote_aet: "REMOTE".to_string(),
            sop_instance_uid: "1.2.3".to_string(),
            sop_class_uid: "1.2.840.10008.5.1.4.1.1.7".to_string(),
            transfer_syntax_uid: "1.2.840.10008.1.2.1".to_string(),
            tags: Tags::new(),
            bytes: b"fake-dicom-bytes".to_vec(),
        }
    }

    #[tokio::test]
    async fn accepted_instance_is_stored_and_indexed() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FilesystemStorage::new(temp_dir.path()).unwrap();
        let index = InMemoryIndex::new();
        let events = EventBus::new();
        let filter = TransferSyntaxFilter::new(Vec::new());

        let outcome = handle_store(&index, &storage, &NullScriptHost, &filter, &events, request())
            .await
            .unwrap();

        assert!(matches!(outcome, StoreOutcome::Stored { .. }));
        assert!(index.main_tags("1.2.3").await.is_some());
    }

    #[tokio::test]
    async fn disallowed_transfer_syntax_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FilesystemStorage::new(temp_dir.path()).unwrap();
        let index = InMemoryIndex::new();
        let events = EventBus::new();
        let filter = TransferSyntaxFilter::new(vec!["1.2.840.10008.1.2".to_string()]);

        let result = handle_store(&index, &storage, &NullScriptHost, &filter, &events, request()).await;
        assert!(result.is_err());
    }
}
