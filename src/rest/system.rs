//! Built-in routes that every deployment gets for free: system identity,
//! the OpenAPI cheat sheet, and the documentation-coverage ratio.

use std::sync::Arc;

use async_trait::async_trait;

use super::{openapi, RestHandler, RestRequest, RestResponse, RouteDoc};
use crate::error::Result;
use crate::server::ServerContext;

pub struct SystemHandler;

#[async_trait]
impl RestHandler for SystemHandler {
    async fn handle(&self, ctx: &Arc<ServerContext>, _req: RestRequest) -> Result<RestResponse> {
        Ok(RestResponse::json(serde_json::json!({
            "Name": "pixelvault",
            "Version": env!("CARGO_PKG_VERSION"),
            "DicomAet": ctx.config.dicom.aet,
            "DicomPort": ctx.config.dicom.port,
            "HttpPort": ctx.config.http.port,
        })))
    }

    fn doc(&self) -> RouteDoc {
        RouteDoc {
            summary: "Server identity and version",
            tags: &["system"],
            documented: true,
        }
    }
}

pub struct OpenApiHandler;

#[async_trait]
impl RestHandler for OpenApiHandler {
    async fn handle(&self, ctx: &Arc<ServerContext>, _req: RestRequest) -> Result<RestResponse> {
        let doc = openapi::generate(&ctx.rest_registry, "pixelvault", env!("CARGO_PKG_VERSION"));
        Ok(RestResponse::json(doc))
    }

    fn doc(&self) -> RouteDoc {
        RouteDoc {
            summary: "OpenAPI 3 document for the registered REST routes",
            tags: &["system"],
            documented: true,
        }
    }
}

pub struct DocumentationCoverageHandler;

#[async_trait]
impl RestHandler for DocumentationCoverageHandler {
    async fn handle(&self, ctx: &Arc<ServerContext>, _req: RestRequest) -> Result<RestResponse> {
        let (documented, total) = ctx.rest_registry.coverage();
        let ratio = if total == 0 {
            0.0
        } else {
            documented as f64 / total as f64
        };
        Ok(RestResponse::json(serde_json::json!({
            "Documented": documented,
            "Total": total,
            "Ratio": ratio,
        })))
    }

    fn doc(&self) -> RouteDoc {
        RouteDoc {
            summary: "Ratio of documented to total registered REST routes",
            tags: &["system"],
            documented: true,
        }
    }
}
