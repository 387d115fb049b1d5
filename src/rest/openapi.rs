//! Minimal OpenAPI 3 document generator: walks the registered routes and
//! their [`super::RouteDoc`] metadata into a `serde_json::Value` document
//! good enough for a cheat-sheet / Swagger UI, not a byte-for-byte replica
//! of any particular schema generator.

use serde_json::{json, Value};

use super::RestRegistry;

pub fn generate(registry: &RestRegistry, title: &str, version: &str) -> Value {
    let mut paths = serde_json::Map::new();

    for entry in registry.entries() {
        let path_key = to_openapi_path(&entry.uri);
        let method_key = entry.method.as_str().to_ascii_lowercase();

        let operation = json!({
            "summary": entry.doc.summary,
            "tags": entry.doc.tags,
            "responses": {
                "200": { "description": "Success" }
            }
        });

        paths
            .entry(path_key)
            .or_insert_with(|| Value::Object(serde_json::Map::new()))
            .as_object_mut()
            .expect("just inserted an object")
            .insert(method_key, operation);
    }

    json!({
        "openapi": "3.0.3",
        "info": { "title": title, "version": version },
        "paths": Value::Object(paths),
    })
}

/// `{name}` captures translate directly; a trailing `*` has no OpenAPI
/// equivalent and is rendered as a literal `{path}` catch-all segment.
fn to_openapi_path(uri: &str) -> String {
    let mut out = String::new();
    for segment in uri.trim_matches('/').split('/').filter(|s| !s.is_empty()) {
        out.push('/');
        if segment == "*" {
            out.push_str("{path}");
        } else {
            out.push_str(segment);
        }
    }
    if out.is_empty() {
        "/".to_string()
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rest::{RestRequest, RestResponse, RouteDoc};
    use crate::server::ServerContext;
    use http::Method;
    use std::sync::Arc;

    #[test]
    fn generates_one_path_entry_per_route() {
        let mut registry = RestRegistry::new();
        registry.register(
            Method::GET,
            "/studies/{id}",
            RouteDoc {
                summary: "get a study",
                tags: &["studies"],
                documented: true,
            },
            |_ctx: Arc<ServerContext>, _req: RestRequest| async {
                Ok(RestResponse::json(serde_json::json!({})))
            },
        );

        let doc = generate(&registry, "pixelvault", "0.1.0");
        assert!(doc["paths"]["/studies/{id}"]["get"]["summary"] == "get a study");
    }

    #[test]
    fn trailing_wildcard_becomes_path_placeholder() {
        assert_eq!(to_openapi_path("/plugins/static/*"), "/plugins/static/{path}");
    }
}
