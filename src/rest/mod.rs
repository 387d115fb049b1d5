//! C7 — REST surface.
//!
//! Typed handler registration on top of the C1 router: each handler
//! receives a parsed [`RestRequest`] (method, URI captures, query string,
//! headers, cookies, body) and returns a [`RestResponse`], plus a small
//! piece of documentation metadata used to generate the OpenAPI document
//! and the documentation-coverage report.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::Method;

use crate::error::{CoreError, Result};
use crate::server::ServerContext;

pub mod openapi;
pub mod system;

/// Where a request originated, per the request-context tuple of spec §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOrigin {
    RestApi,
    DicomProtocol,
    Lua,
    Plugin,
    Documentation,
    WebDav,
}

#[derive(Debug, Clone)]
pub struct RestRequest {
    pub method: Method,
    pub path: String,
    pub captures: BTreeMap<String, String>,
    pub trailing: Vec<String>,
    /// GET arguments in wire order; duplicate keys are kept as separate
    /// entries rather than collapsed, per spec §3.
    pub query: Vec<(String, String)>,
    pub headers: HashMap<String, String>,
    pub cookies: HashMap<String, String>,
    pub body: Bytes,
    pub origin: RequestOrigin,
    pub remote_ip: std::net::IpAddr,
    /// Authenticated username, empty when the request is anonymous.
    pub username: String,
}

impl RestRequest {
    pub fn capture(&self, name: &str) -> Result<&str> {
        self.captures
            .get(name)
            .map(|s| s.as_str())
            .ok_or_else(|| CoreError::InternalError(format!("missing URI capture '{}'", name)))
    }

    /// First value recorded for `name` among the GET arguments, in wire
    /// order.
    pub fn query_arg(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn json_body<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body)
            .map_err(|e| CoreError::BadFileFormat(format!("invalid JSON body: {}", e)))
    }
}

#[derive(Debug, Clone)]
pub struct RestResponse {
    pub status: http::StatusCode,
    pub content_type: String,
    pub body: Vec<u8>,
}

impl RestResponse {
    pub fn json(value: serde_json::Value) -> Self {
        Self {
            status: http::StatusCode::OK,
            content_type: "application/json".to_string(),
            body: serde_json::to_vec(&value).unwrap_or_default(),
        }
    }

    pub fn with_status(mut self, status: http::StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn bytes(status: http::StatusCode, content_type: &str, body: Vec<u8>) -> Self {
        Self {
            status,
            content_type: content_type.to_string(),
            body,
        }
    }
}

/// Documentation metadata for one registered route, consumed by the
/// OpenAPI generator and the coverage report.
#[derive(Debug, Clone)]
pub struct RouteDoc {
    pub summary: &'static str,
    pub tags: &'static [&'static str],
    /// `false` marks a route as intentionally undocumented (internal,
    /// deprecated) so it is excluded from the coverage denominator.
    pub documented: bool,
}

impl Default for RouteDoc {
    fn default() -> Self {
        Self {
            summary: "",
            tags: &[],
            documented: false,
        }
    }
}

#[async_trait]
pub trait RestHandler: Send + Sync {
    async fn handle(&self, ctx: &Arc<ServerContext>, req: RestRequest) -> Result<RestResponse>;

    fn doc(&self) -> RouteDoc {
        RouteDoc::default()
    }
}

#[async_trait]
impl<F, Fut> RestHandler for F
where
    F: Fn(Arc<ServerContext>, RestRequest) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<RestResponse>> + Send,
{
    async fn handle(&self, ctx: &Arc<ServerContext>, req: RestRequest) -> Result<RestResponse> {
        (self)(ctx.clone(), req).await
    }
}

pub type BoxedHandler = Arc<dyn RestHandler>;

/// A registered route: its template (re-parsed for doc purposes), method,
/// and handler.
pub struct RouteEntry {
    pub uri: String,
    pub method: Method,
    pub doc: RouteDoc,
    pub handler: BoxedHandler,
}

/// Registry gluing the C1 router to typed handlers, plus a documentation
/// visitor for OpenAPI generation and coverage reporting.
pub struct RestRegistry {
    router: crate::router::Router<BoxedHandler>,
    entries: Vec<RouteEntry>,
}

impl Default for RestRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl RestRegistry {
    pub fn new() -> Self {
        Self {
            router: crate::router::Router::new(),
            entries: Vec::new(),
        }
    }

    pub fn register(
        &mut self,
        method: Method,
        uri: &str,
        doc: RouteDoc,
        handler: impl RestHandler + 'static,
    ) {
        let handler: BoxedHandler = Arc::new(handler);
        self.router
            .register(method.clone(), uri, handler.clone())
            .unwrap_or_else(|e| panic!("invalid route template '{}': {}", uri, e));
        self.entries.push(RouteEntry {
            uri: uri.to_string(),
            method,
            doc,
            handler,
        });
    }

    pub fn dispatch(&self, method: &Method, path: &str) -> crate::router::Dispatch<'_, BoxedHandler> {
        self.router.dispatch(method, path)
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    /// Fraction of registered routes carrying real documentation, used by
    /// `GET /tools/documentation-coverage`.
    pub fn coverage(&self) -> (usize, usize) {
        let documented = self.entries.iter().filter(|e| e.doc.documented).count();
        (documented, self.entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coverage_counts_documented_routes() {
        let mut registry = RestRegistry::new();
        registry.register(
            Method::GET,
            "/a",
            RouteDoc {
                summary: "a",
                tags: &[],
                documented: true,
            },
            |_ctx: Arc<ServerContext>, _req: RestRequest| async {
                Ok(RestResponse::json(serde_json::json!({})))
            },
        );
        registry.register(
            Method::GET,
            "/b",
            RouteDoc::default(),
            |_ctx: Arc<ServerContext>, _req: RestRequest| async {
                Ok(RestResponse::json(serde_json::json!({})))
            },
        );

        assert_eq!(registry.coverage(), (1, 2));
    }
}
