//! C6 — the HTTP engine: the per-request pipeline that turns a raw
//! socket request into a dispatched [`crate::rest::RestRequest`] and a
//! rendered response, tying together the router (C1), negotiation (C2),
//! the output sink (C3), the chunk store (C4), and the multipart reader
//! (C5).

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use tokio::sync::Mutex;

use crate::error::CoreError;
use crate::http::chunk_store::{ChunkOutcome, ChunkStore};
use crate::http::cookies::parse_cookies;
use crate::http::multipart::{MultipartStreamReader, Part};
use crate::http::output::Compression;
use crate::policy::auth::{self, AuthOutcome};
use crate::policy::script::HttpRequestFacts;
use crate::rest::{RestRequest, RestResponse};
use crate::router::Dispatch;
use crate::server::ServerContext;

/// Request-scoped state the engine needs beyond what `ServerContext`
/// carries: the chunked-upload aggregation store is keyed per server, not
/// per request, so it lives here wrapped for interior mutability.
pub struct EngineState {
    ctx: Arc<ServerContext>,
    chunk_store: Mutex<ChunkStore>,
}

const CHUNK_STORE_CAPACITY: usize = 64;

/// Brings up the axum listener bound to the configured HTTP address and
/// serves every request through [`handle_request`] until the process is
/// asked to stop.
pub async fn serve(ctx: Arc<ServerContext>) -> anyhow::Result<()> {
    let bind_address = ctx.config.http.bind_address.clone();
    let port = ctx.config.http.port;

    let state = Arc::new(EngineState {
        ctx,
        chunk_store: Mutex::new(ChunkStore::new(CHUNK_STORE_CAPACITY)),
    });

    let app = axum::Router::new()
        .route("/{*path}", any(handle_request))
        .route("/", any(handle_request))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", bind_address, port)).await?;
    tracing::info!("HTTP engine listening on {}:{}", bind_address, port);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

async fn handle_request(
    State(state): State<Arc<EngineState>>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    method: axum::http::Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match process(&state, remote, &method, &uri, &headers, body).await {
        Ok(response) => response,
        Err(error) => error_response(&error),
    }
}

fn lowercase_headers(headers: &HeaderMap) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for (name, value) in headers {
        if let Ok(text) = value.to_str() {
            out.insert(name.as_str().to_ascii_lowercase(), text.to_string());
        }
    }
    out
}

/// GET arguments in wire order; duplicate keys are kept as separate
/// entries rather than collapsed into a map, per spec §3.
fn parse_query(uri: &Uri) -> Vec<(String, String)> {
    uri.query()
        .map(|q| {
            urlencoding::decode(q)
                .map(|decoded| decoded.into_owned())
                .unwrap_or_else(|_| q.to_string())
        })
        .map(|q| {
            q.split('&')
                .filter(|pair| !pair.is_empty())
                .filter_map(|pair| pair.split_once('='))
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        })
        .unwrap_or_default()
}

fn query_lookup<'a>(query: &'a [(String, String)], name: &str) -> Option<&'a str> {
    query.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
}

/// Resolves the effective method for a request, honoring the
/// `X-HTTP-Method-Override` header or a `?_method=` query argument, both
/// the header takes precedence over the query argument.
fn effective_method(
    method: &axum::http::Method,
    headers: &HashMap<String, String>,
    query: &[(String, String)],
) -> axum::http::Method {
    let override_value = headers
        .get("x-http-method-override")
        .map(String::as_str)
        .or_else(|| query_lookup(query, "_method"));

    match override_value {
        Some(raw) => axum::http::Method::from_bytes(raw.to_ascii_uppercase().as_bytes())
            .unwrap_or_else(|_| method.clone()),
        None => method.clone(),
    }
}

async fn process(
    state: &Arc<EngineState>,
    remote: SocketAddr,
    method: &axum::http::Method,
    uri: &Uri,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<Response, CoreError> {
    let ctx = &state.ctx;
    let lower_headers = lowercase_headers(headers);

    if !ctx.config.http.remote_access_allowed && !remote.ip().is_loopback() {
        return Err(CoreError::Unauthorized(
            "remote access is disabled for this server".to_string(),
        ));
    }

    let compression = negotiate_compression(&lower_headers, ctx.config.http.compression_enabled);
    let query = parse_query(uri);

    let username = match auth::authenticate(&lower_headers, &ctx.config.http.basic_auth_users)? {
        AuthOutcome::BasicUser(user) => user,
        AuthOutcome::Anonymous | AuthOutcome::BearerToken => String::new(),
    };

    let method = effective_method(method, &lower_headers, &query);
    let path = uri.path().to_string();

    let facts = HttpRequestFacts {
        method: method.as_str().to_string(),
        path: path.clone(),
        remote_aet: None,
    };
    if !ctx.script_host.filter_incoming_http_request(&facts).await {
        return Err(CoreError::Unauthorized(
            "request rejected by the scripted authorization filter".to_string(),
        ));
    }

    let effective_body = intake_body(state, &lower_headers, body).await?;

    let cookies = lower_headers
        .get("cookie")
        .map(|c| parse_cookies(c))
        .unwrap_or_default();

    let request = RestRequest {
        method: method.clone(),
        path: path.clone(),
        captures: Default::default(),
        trailing: Vec::new(),
        query,
        headers: lower_headers,
        cookies,
        body: effective_body,
        origin: crate::rest::RequestOrigin::RestApi,
        remote_ip: remote.ip(),
        username,
    };

    dispatch(ctx, request, compression).await
}

fn negotiate_compression(headers: &HashMap<String, String>, enabled: bool) -> Compression {
    if !enabled {
        return Compression::None;
    }
    match headers.get("accept-encoding") {
        Some(value) => {
            let value = value.to_ascii_lowercase();
            if value.contains("gzip") {
                Compression::Gzip
            } else if value.contains("deflate") {
                Compression::Deflate
            } else {
                Compression::None
            }
        }
        None => Compression::None,
    }
}

/// Body intake: whole-body read by default; when the upload-signalling
/// headers (`X-Requested-With: XMLHttpRequest`, `X-File-Name`,
/// `X-File-Size`) are present, each multipart part is instead routed
/// through the C4 chunk store and the effective body becomes the
/// reassembled file once the declared total is reached.
async fn intake_body(
    state: &Arc<EngineState>,
    headers: &HashMap<String, String>,
    body: Bytes,
) -> Result<Bytes, CoreError> {
    let is_chunked_upload = headers.get("x-requested-with").map(String::as_str) == Some("XMLHttpRequest")
        && headers.contains_key("x-file-name")
        && headers.contains_key("x-file-size");

    let content_type = headers.get("content-type").cloned().unwrap_or_default();

    if !content_type.starts_with("multipart/") {
        return Ok(body);
    }

    let boundary = crate::http::multipart::parse_boundary(&content_type)
        .ok_or_else(|| CoreError::BadRequest("multipart body missing a boundary".to_string()))?;

    let mut parts: Vec<Part> = Vec::new();
    let mut reader = MultipartStreamReader::new(&boundary);
    reader.add_chunk(&body, &mut |p: Part| parts.push(p))?;
    reader.close_stream(&mut |p: Part| parts.push(p))?;

    if !is_chunked_upload {
        // A plain multipart/form-data submission with no chunked-upload
        // signalling: the first part's body stands in for the request
        // body the route actually wants.
        return Ok(parts
            .into_iter()
            .next()
            .map(|p| Bytes::from(p.body))
            .unwrap_or_default());
    }

    let file_name = headers
        .get("x-file-name")
        .cloned()
        .unwrap_or_else(|| "upload".to_string());
    let expected_total: Option<u64> = headers.get("x-file-size").and_then(|v| v.parse().ok());

    let mut store = state.chunk_store.lock().await;
    let mut completed = None;
    for part in parts {
        match store.add_chunk(&file_name, &part.body, expected_total) {
            ChunkOutcome::Success(data) => completed = Some(data),
            ChunkOutcome::Failure(reason) => return Err(CoreError::BadRequest(reason)),
            ChunkOutcome::Pending | ChunkOutcome::NoLength => {}
        }
    }

    Ok(completed.map(Bytes::from).unwrap_or_default())
}

async fn dispatch(
    ctx: &Arc<ServerContext>,
    mut request: RestRequest,
    compression: Compression,
) -> Result<Response, CoreError> {
    let (handler, captures, trailing) = match ctx.rest_registry.dispatch(&request.method, &request.path) {
        Dispatch::Matched {
            handler,
            captures,
            trailing,
        } => (handler.clone(), captures, trailing),
        Dispatch::MethodNotAllowed { allowed } => {
            let allow = allowed
                .iter()
                .map(|m| m.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            let mut response =
                (StatusCode::METHOD_NOT_ALLOWED, "method not allowed").into_response();
            response
                .headers_mut()
                .insert("allow", allow.parse().expect("allow header value"));
            return Ok(response);
        }
        Dispatch::NotFound => {
            return Err(CoreError::InexistentItem(format!(
                "no route registered for '{}'",
                request.path
            )))
        }
    };

    request.captures = captures;
    request.trailing = trailing;

    let rest_response = handler.handle(ctx, request).await?;
    Ok(render(rest_response, compression))
}

fn render(response: RestResponse, compression: Compression) -> Response {
    let mut sink = crate::http::output::HttpOutputSink::new();
    sink.set_compression(compression);
    let _ = sink.send_status(response.status);
    let _ = sink.send_body(response.body, &response.content_type);
    let draft = match sink.finalize() {
        Ok(draft) => draft,
        Err(e) => return error_response(&e),
    };

    let mut builder = Response::builder().status(draft.status);
    for (name, value) in &draft.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    let body = match draft.body {
        crate::http::output::ResponseBody::Empty => Vec::new(),
        crate::http::output::ResponseBody::Bytes(b) => b,
        crate::http::output::ResponseBody::Multipart { rendered, .. } => rendered,
    };

    builder.body(axum::body::Body::from(body)).unwrap_or_else(|_| {
        (StatusCode::INTERNAL_SERVER_ERROR, "failed to build response").into_response()
    })
}

/// The canonical JSON error body every uncaught `CoreError` is rendered
/// into at the top-level catch.
fn error_response(error: &CoreError) -> Response {
    let status =
        StatusCode::from_u16(error.http_status().as_u16()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = error.to_json_body();
    (status, axum::Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_from(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (k, v) in pairs {
            headers.insert(
                axum::http::HeaderName::from_bytes(k.as_bytes()).unwrap(),
                v.parse().unwrap(),
            );
        }
        headers
    }

    #[test]
    fn lowercase_headers_lowercases_keys_only() {
        let headers = headers_from(&[("X-File-Name", "Report.dcm"), ("Accept", "*/*")]);
        let lower = lowercase_headers(&headers);
        assert_eq!(lower.get("x-file-name").unwrap(), "Report.dcm");
        assert_eq!(lower.get("accept").unwrap(), "*/*");
    }

    #[test]
    fn parse_query_preserves_order_and_decodes() {
        let uri: Uri = "/studies?a=1&b=hello%20world&a=2".parse().unwrap();
        let query = parse_query(&uri);
        assert_eq!(
            query,
            vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "hello world".to_string()),
                ("a".to_string(), "2".to_string()),
            ]
        );
    }

    #[test]
    fn parse_query_empty_without_query_string() {
        let uri: Uri = "/studies".parse().unwrap();
        assert!(parse_query(&uri).is_empty());
    }

    #[test]
    fn effective_method_header_override_wins_over_query() {
        let mut headers = HashMap::new();
        headers.insert("x-http-method-override".to_string(), "DELETE".to_string());
        let query = vec![("_method".to_string(), "PUT".to_string())];

        let method = effective_method(&axum::http::Method::GET, &headers, &query);
        assert_eq!(method, axum::http::Method::DELETE);
    }

    #[test]
    fn effective_method_falls_back_to_query_then_wire_method() {
        let headers = HashMap::new();
        let query = vec![("_method".to_string(), "put".to_string())];
        assert_eq!(
            effective_method(&axum::http::Method::GET, &headers, &query),
            axum::http::Method::PUT
        );

        let empty_query = Vec::new();
        assert_eq!(
            effective_method(&axum::http::Method::POST, &headers, &empty_query),
            axum::http::Method::POST
        );
    }

    #[test]
    fn effective_method_is_idempotent() {
        let mut headers = HashMap::new();
        headers.insert("x-http-method-override".to_string(), "DELETE".to_string());
        let query = Vec::new();

        let once = effective_method(&axum::http::Method::GET, &headers, &query);
        let twice = effective_method(&once, &headers, &query);
        assert_eq!(once, twice);
    }

    #[test]
    fn negotiate_compression_prefers_gzip_over_deflate() {
        let mut headers = HashMap::new();
        headers.insert("accept-encoding".to_string(), "deflate, gzip".to_string());
        assert_eq!(negotiate_compression(&headers, true), Compression::Gzip);
    }

    #[test]
    fn negotiate_compression_falls_back_to_deflate() {
        let mut headers = HashMap::new();
        headers.insert("accept-encoding".to_string(), "deflate".to_string());
        assert_eq!(negotiate_compression(&headers, true), Compression::Deflate);
    }

    #[test]
    fn negotiate_compression_disabled_globally_ignores_accept_encoding() {
        let mut headers = HashMap::new();
        headers.insert("accept-encoding".to_string(), "gzip".to_string());
        assert_eq!(negotiate_compression(&headers, false), Compression::None);
    }

    #[test]
    fn negotiate_compression_none_without_header() {
        let headers = HashMap::new();
        assert_eq!(negotiate_compression(&headers, true), Compression::None);
    }
}
