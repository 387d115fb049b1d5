//! Wiring: constructs the collaborators every handler needs and threads
//! them through a single `Arc<ServerContext>` rather than reaching for
//! process-wide state (the only two exceptions live in
//! [`crate::globals`]). Also bridges the kept DIMSE toolkit's
//! `QueryProvider` seam onto the C8 dispatcher handlers.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dimse::config::DimseConfig;
use dimse::scp::{DimseScp, GetResponder, QueryProvider};
use dimse::types::{DatasetStream, QueryLevel as WireQueryLevel};

use crate::config::Config;
use crate::dicom;
use crate::error::{CoreError, Result};
use crate::events::EventBus;
use crate::index::{Index, InMemoryIndex, QueryLevel};
use crate::jobs::{JobManager, RetryPolicy, StopOnFailure};
use crate::plugins::PluginBus;
use crate::policy::{AllowList, NullScriptHost, ScriptHost, TransferSyntaxFilter};
use crate::rest::system::{DocumentationCoverageHandler, OpenApiHandler, SystemHandler};
use crate::rest::{RestRegistry, RouteDoc};
use crate::storage::{create_storage_backend, StorageBackend};

/// Everything a REST handler, a DICOM service handler, or the HTTP engine
/// needs, bundled so one `Arc` clone hands a task its whole world.
pub struct ServerContext {
    pub config: Arc<Config>,
    pub rest_registry: RestRegistry,
    pub storage: Arc<dyn StorageBackend>,
    pub index: Arc<dyn Index>,
    pub jobs: Arc<JobManager>,
    pub events: Arc<EventBus>,
    pub script_host: Arc<dyn ScriptHost>,
    pub aet_allow_list: Arc<AllowList>,
    pub transfer_syntax_filter: Arc<TransferSyntaxFilter>,
    pub plugins: Arc<PluginBus>,
}

impl ServerContext {
    pub fn build(config: Config) -> Result<Arc<Self>> {
        let storage = create_storage_backend(&config.storage)?;
        let aet_allow_list = AllowList::new(&[])
            .map_err(|e| CoreError::InternalError(format!("building default allow-list: {}", e)))?;
        let transfer_syntax_filter = TransferSyntaxFilter::new(config.dicom.accepted_transfer_syntaxes.clone());
        let retry_policy = RetryPolicy::new(
            std::time::Duration::from_secs(1),
            std::time::Duration::from_secs(config.jobs.retry_backoff_cap_seconds),
        );
        let stop_on_failure = if config.jobs.stop_on_failure_default {
            StopOnFailure::Strict
        } else {
            StopOnFailure::Permissive
        };

        let mut rest_registry = RestRegistry::new();
        register_system_routes(&mut rest_registry);

        Ok(Arc::new(Self {
            config: Arc::new(config),
            rest_registry,
            storage,
            index: Arc::new(InMemoryIndex::new()),
            jobs: Arc::new(JobManager::new(retry_policy, stop_on_failure)),
            events: crate::globals::event_bus(),
            script_host: Arc::new(NullScriptHost),
            aet_allow_list: Arc::new(aet_allow_list),
            transfer_syntax_filter: Arc::new(transfer_syntax_filter),
            plugins: Arc::new(PluginBus::new()),
        }))
    }
}

fn register_system_routes(registry: &mut RestRegistry) {
    registry.register(
        http::Method::GET,
        "/system",
        RouteDoc {
            summary: "Server identity and version",
            tags: &["system"],
            documented: true,
        },
        SystemHandler,
    );
    registry.register(
        http::Method::GET,
        "/tools/openapi",
        RouteDoc {
            summary: "OpenAPI document",
            tags: &["system"],
            documented: true,
        },
        OpenApiHandler,
    );
    registry.register(
        http::Method::GET,
        "/tools/documentation-coverage",
        RouteDoc {
            summary: "Documentation coverage ratio",
            tags: &["system"],
            documented: true,
        },
        DocumentationCoverageHandler,
    );
}

/// Bridges the opaque DIMSE toolkit's `QueryProvider`/`GetResponder` seam
/// onto the C8 dispatcher handlers. Dataset *encoding* is the toolkit's
/// job and stays out of scope here: this bridge carries matched tags as
/// DICOM-JSON bytes inside `DatasetStream::Memory` rather than building a
/// real `InMemDicomObject` per match, which would duplicate the
/// toolkit's own encoding responsibility.
pub struct DicomBridge {
    ctx: Arc<ServerContext>,
}

impl DicomBridge {
    pub fn new(ctx: Arc<ServerContext>) -> Self {
        Self { ctx }
    }

    fn map_level(level: WireQueryLevel) -> QueryLevel {
        match level {
            WireQueryLevel::Patient => QueryLevel::Patient,
            WireQueryLevel::Study => QueryLevel::Study,
            WireQueryLevel::Series => QueryLevel::Series,
            WireQueryLevel::Image => QueryLevel::Instance,
        }
    }
}

#[async_trait]
impl QueryProvider for DicomBridge {
    async fn find(
        &self,
        query_level: WireQueryLevel,
        parameters: &HashMap<String, String>,
        _max_results: u32,
    ) -> dimse::Result<Vec<DatasetStream>> {
        let request = dicom::FindRequest {
            level: Self::map_level(query_level),
            remote_aet: String::new(),
            query: parameters.clone(),
        };
        let answer = dicom::handle_find(self.ctx.index.as_ref(), self.ctx.script_host.as_ref(), request)
            .await
            .map_err(|e| dimse::DimseError::operation_failed(e.to_string()))?;

        answer
            .matches
            .into_iter()
            .map(|tags| {
                let payload = serde_json::to_vec(&tags)
                    .map_err(|e| dimse::DimseError::operation_failed(e.to_string()))?;
                Ok(DatasetStream::from_bytes(bytes::Bytes::from(payload)))
            })
            .collect()
    }

    async fn locate(
        &self,
        query_level: WireQueryLevel,
        parameters: &HashMap<String, String>,
    ) -> dimse::Result<Vec<DatasetStream>> {
        self.find(query_level, parameters, u32::MAX).await
    }

    async fn store(&self, dataset: DatasetStream) -> dimse::Result<()> {
        let bytes = dataset
            .to_bytes()
            .await
            .map_err(|e| dimse::DimseError::operation_failed(e.to_string()))?;
        let metadata = dataset.metadata().clone();

        let request = dicom::StoreRequest {
            remote_aet: String::new(),
            sop_instance_uid: metadata.sop_instance_uid.unwrap_or_default(),
            sop_class_uid: metadata.sop_class_uid.unwrap_or_default(),
            transfer_syntax_uid: metadata.transfer_syntax.unwrap_or_default(),
            tags: HashMap::new(),
            bytes: bytes.to_vec(),
        };

        dicom::handle_store(
            self.ctx.index.as_ref(),
            self.ctx.storage.as_ref(),
            self.ctx.script_host.as_ref(),
            &self.ctx.transfer_syntax_filter,
            &self.ctx.events,
            request,
        )
        .await
        .map_err(|e| dimse::DimseError::operation_failed(e.to_string()))?;

        Ok(())
    }
}

/// A `GetResponder` that has nowhere real to push to; wired in until the
/// association-level C-GET transport is built on top of the toolkit.
pub struct NullGetResponder;

#[async_trait]
impl GetResponder for NullGetResponder {
    async fn send_instance(&self, _dataset: DatasetStream) -> dimse::Result<()> {
        Ok(())
    }
}

/// Brings up the HTTP engine and the DICOM SCP side by side, matching the
/// teacher's `run(config)` shape.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let ctx = ServerContext::build(config)?;

    let worker_handles = ctx.jobs.spawn_workers(ctx.config.jobs.worker_count);

    let dimse_config = DimseConfig {
        local_aet: ctx.config.dicom.aet.clone(),
        port: ctx.config.dicom.port,
        max_associations: ctx.config.dicom.max_associations,
        ..Default::default()
    };
    let bridge = Arc::new(DicomBridge::new(ctx.clone()));
    let scp = DimseScp::new(dimse_config, bridge);

    let http_ctx = ctx.clone();
    let http_handle = tokio::spawn(async move {
        if let Err(e) = crate::http::engine::serve(http_ctx).await {
            tracing::error!("HTTP engine exited: {}", e);
        }
    });

    let scp_handle = tokio::spawn(async move {
        if let Err(e) = scp.run().await {
            tracing::error!("DIMSE SCP exited: {}", e);
        }
    });

    let _ = tokio::join!(http_handle, scp_handle);
    for handle in worker_handles {
        handle.abort();
    }
    Ok(())
}
