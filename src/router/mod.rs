//! C1 — hierarchical URI router.
//!
//! A precompiled template per registered route, matched against a request
//! path split into `/`-separated components. Supports named captures
//! (`{name}`) and a single trailing wildcard (`*`) that must be the last
//! segment of the template and captures every remaining path component.
//!
//! A template component is either a literal (must equal the path's
//! component), a capture (always matches, binds a name), or absent (no
//! trailing) vs. present (trailing, binds the remainder). Matching does a
//! length check first, then walks components comparing literal/capture
//! in order.

use std::collections::BTreeMap;
use std::fmt;

use http::Method;

/// One path component of a compiled template.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Capture(String),
}

/// A precompiled route template, mirroring `RestApiPath`.
#[derive(Debug, Clone)]
pub struct Template {
    segments: Vec<Segment>,
    has_trailing: bool,
    raw: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    EmptyComponent,
    TrailingNotLast,
    DuplicateCapture(String),
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateError::EmptyComponent => write!(f, "URI template contains an empty component"),
            TemplateError::TrailingNotLast => {
                write!(f, "trailing wildcard '*' must be the last path component")
            }
            TemplateError::DuplicateCapture(name) => {
                write!(f, "duplicate capture name '{{{}}}' in template", name)
            }
        }
    }
}

impl std::error::Error for TemplateError {}

fn split_uri(uri: &str) -> Vec<&str> {
    uri.trim_matches('/').split('/').filter(|s| !s.is_empty()).collect()
}

impl Template {
    pub fn parse(uri: &str) -> Result<Self, TemplateError> {
        let raw_parts = split_uri(uri);

        // A trailing '*' may only appear as the raw last token; reject one
        // appearing earlier even if later literal/capture tokens follow.
        if let Some(pos) = raw_parts.iter().position(|p| *p == "*") {
            if pos != raw_parts.len() - 1 {
                return Err(TemplateError::TrailingNotLast);
            }
        }

        let has_trailing = raw_parts.last() == Some(&"*");
        let parts: &[&str] = if has_trailing {
            &raw_parts[..raw_parts.len() - 1]
        } else {
            &raw_parts[..]
        };

        let mut segments = Vec::with_capacity(parts.len());
        let mut seen = std::collections::HashSet::new();
        for part in parts {
            if part.is_empty() {
                return Err(TemplateError::EmptyComponent);
            }
            if part.starts_with('{') && part.ends_with('}') && part.len() >= 2 {
                let name = part[1..part.len() - 1].to_string();
                if !seen.insert(name.clone()) {
                    return Err(TemplateError::DuplicateCapture(name));
                }
                segments.push(Segment::Capture(name));
            } else {
                segments.push(Segment::Literal((*part).to_string()));
            }
        }

        Ok(Template {
            segments,
            has_trailing,
            raw: uri.to_string(),
        })
    }

    /// Attempt to match `path` against this template, returning bound
    /// captures and the trailing remainder (empty unless `has_trailing`).
    pub fn matches(&self, path: &str) -> Option<Matched> {
        let parts = split_uri(path);

        if parts.len() < self.segments.len() {
            return None;
        }
        if !self.has_trailing && parts.len() > self.segments.len() {
            return None;
        }

        let mut captures = BTreeMap::new();
        for (seg, part) in self.segments.iter().zip(parts.iter()) {
            match seg {
                Segment::Literal(lit) => {
                    if lit != part {
                        return None;
                    }
                }
                Segment::Capture(name) => {
                    captures.insert(name.clone(), (*part).to_string());
                }
            }
        }

        let trailing = if self.has_trailing {
            parts[self.segments.len()..]
                .iter()
                .map(|s| s.to_string())
                .collect()
        } else {
            Vec::new()
        };

        Some(Matched { captures, trailing })
    }

    pub fn is_wildcard_level(&self, level: usize) -> bool {
        matches!(self.segments.get(level), Some(Segment::Capture(_)))
    }

    pub fn level_name(&self, level: usize) -> Option<&str> {
        match self.segments.get(level)? {
            Segment::Literal(s) => Some(s.as_str()),
            Segment::Capture(_) => None,
        }
    }

    pub fn wildcard_name(&self, level: usize) -> Option<&str> {
        match self.segments.get(level)? {
            Segment::Capture(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Matched {
    pub captures: BTreeMap<String, String>,
    pub trailing: Vec<String>,
}

/// Outcome of dispatching a path+method against the registered routes.
pub enum Dispatch<'a, H> {
    Matched {
        handler: &'a H,
        captures: BTreeMap<String, String>,
        trailing: Vec<String>,
    },
    /// The path matched at least one route, but not for this method.
    MethodNotAllowed { allowed: Vec<Method> },
    NotFound,
}

struct Route<H> {
    template: Template,
    method: Method,
    handler: H,
}

/// Registration-order route table. Routes are scanned in registration
/// order and the first template+method match wins, a linear-scan
/// dispatch.
pub struct Router<H> {
    routes: Vec<Route<H>>,
}

impl<H> Default for Router<H> {
    fn default() -> Self {
        Self { routes: Vec::new() }
    }
}

impl<H> Router<H> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        method: Method,
        uri: &str,
        handler: H,
    ) -> Result<(), TemplateError> {
        let template = Template::parse(uri)?;
        self.routes.push(Route {
            template,
            method,
            handler,
        });
        Ok(())
    }

    pub fn dispatch(&self, method: &Method, path: &str) -> Dispatch<'_, H> {
        let mut allowed = Vec::new();

        for route in &self.routes {
            if let Some(m) = route.template.matches(path) {
                if &route.method == method {
                    return Dispatch::Matched {
                        handler: &route.handler,
                        captures: m.captures,
                        trailing: m.trailing,
                    };
                }
                if !allowed.contains(&route.method) {
                    allowed.push(route.method.clone());
                }
            }
        }

        if allowed.is_empty() {
            Dispatch::NotFound
        } else {
            allowed.sort_by(|a, b| a.as_str().cmp(b.as_str()));
            Dispatch::MethodNotAllowed { allowed }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_template_matches_exactly() {
        let t = Template::parse("/system").unwrap();
        assert!(t.matches("/system").is_some());
        assert!(t.matches("/system/extra").is_none());
        assert!(t.matches("/").is_none());
    }

    #[test]
    fn capture_binds_name_to_component() {
        let t = Template::parse("/instances/{id}/file").unwrap();
        let m = t.matches("/instances/abc-123/file").unwrap();
        assert_eq!(m.captures.get("id"), Some(&"abc-123".to_string()));
        assert!(m.trailing.is_empty());
    }

    #[test]
    fn trailing_wildcard_captures_remainder() {
        let t = Template::parse("/plugins/static/*").unwrap();
        let m = t.matches("/plugins/static/js/app.js").unwrap();
        assert_eq!(m.trailing, vec!["js".to_string(), "app.js".to_string()]);
    }

    #[test]
    fn trailing_wildcard_allows_exact_length_too() {
        let t = Template::parse("/plugins/static/*").unwrap();
        let m = t.matches("/plugins/static").unwrap();
        assert!(m.trailing.is_empty());
    }

    #[test]
    fn non_trailing_rejects_longer_paths() {
        let t = Template::parse("/studies/{id}").unwrap();
        assert!(t.matches("/studies/1/series").is_none());
    }

    #[test]
    fn wildcard_must_be_last_segment() {
        assert_eq!(
            Template::parse("/a/*/b"),
            Err(TemplateError::TrailingNotLast)
        );
    }

    #[test]
    fn duplicate_capture_name_rejected() {
        assert_eq!(
            Template::parse("/a/{id}/b/{id}"),
            Err(TemplateError::DuplicateCapture("id".to_string()))
        );
    }

    #[test]
    fn router_returns_method_not_allowed_with_sorted_allow_list() {
        let mut r: Router<&'static str> = Router::new();
        r.register(Method::GET, "/studies/{id}", "get").unwrap();
        r.register(Method::DELETE, "/studies/{id}", "delete").unwrap();

        match r.dispatch(&Method::POST, "/studies/42") {
            Dispatch::MethodNotAllowed { allowed } => {
                assert_eq!(allowed, vec![Method::DELETE, Method::GET]);
            }
            _ => panic!("expected MethodNotAllowed"),
        }
    }

    #[test]
    fn router_not_found_for_unmatched_path() {
        let mut r: Router<&'static str> = Router::new();
        r.register(Method::GET, "/studies/{id}", "get").unwrap();
        assert!(matches!(r.dispatch(&Method::GET, "/other"), Dispatch::NotFound));
    }

    #[test]
    fn first_registered_match_wins() {
        let mut r: Router<&'static str> = Router::new();
        r.register(Method::GET, "/a/{x}", "generic").unwrap();
        r.register(Method::GET, "/a/fixed", "specific").unwrap();

        match r.dispatch(&Method::GET, "/a/fixed") {
            Dispatch::Matched { handler, .. } => assert_eq!(*handler, "generic"),
            _ => panic!("expected match"),
        }
    }
}
