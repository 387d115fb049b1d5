//! Scripted predicate boundary: incoming-HTTP-request,
//! incoming-C-FIND-request, and received-instance callbacks are modeled as
//! the `ScriptHost` trait's typed call surface rather than an embedded
//! scripting VM, which stays out of scope. Two implementations ship:
//! [`NullScriptHost`], which always allows, and [`ScriptedRule`], a
//! table-driven allow/deny filter usable without any embedded
//! interpreter.

use std::collections::HashMap;

use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct HttpRequestFacts {
    pub method: String,
    pub path: String,
    pub remote_aet: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FindRequestFacts {
    pub remote_aet: String,
    pub query_level: String,
}

#[derive(Debug, Clone)]
pub struct ReceivedInstanceFacts {
    pub remote_aet: String,
    pub sop_class_uid: String,
}

#[async_trait]
pub trait ScriptHost: Send + Sync {
    async fn filter_incoming_http_request(&self, facts: &HttpRequestFacts) -> bool;
    async fn filter_incoming_find_request(&self, facts: &FindRequestFacts) -> bool;
    async fn on_received_instance(&self, facts: &ReceivedInstanceFacts) -> bool;
}

pub struct NullScriptHost;

#[async_trait]
impl ScriptHost for NullScriptHost {
    async fn filter_incoming_http_request(&self, _facts: &HttpRequestFacts) -> bool {
        true
    }

    async fn filter_incoming_find_request(&self, _facts: &FindRequestFacts) -> bool {
        true
    }

    async fn on_received_instance(&self, _facts: &ReceivedInstanceFacts) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

/// A single allow/deny row keyed on a predicate field (method, AET, ...)
/// with regex-style matching, in the spirit of a Lua table-driven rule.
#[derive(Debug, Clone)]
pub struct Rule {
    pub field: String,
    pub pattern: regex_lite::Pattern,
    pub decision: Decision,
}

/// A small table of rules evaluated in order; the first matching row wins,
/// and no match defaults to `Allow`.
pub struct ScriptedRule {
    http_rules: Vec<Rule>,
    find_rules: Vec<Rule>,
}

impl ScriptedRule {
    pub fn new(http_rules: Vec<Rule>, find_rules: Vec<Rule>) -> Self {
        Self { http_rules, find_rules }
    }

    fn evaluate(rules: &[Rule], fields: &HashMap<&str, &str>) -> bool {
        for rule in rules {
            if let Some(value) = fields.get(rule.field.as_str()) {
                if rule.pattern.matches(value) {
                    return rule.decision == Decision::Allow;
                }
            }
        }
        true
    }
}

#[async_trait]
impl ScriptHost for ScriptedRule {
    async fn filter_incoming_http_request(&self, facts: &HttpRequestFacts) -> bool {
        let aet = facts.remote_aet.as_deref().unwrap_or("");
        let fields = HashMap::from([
            ("method", facts.method.as_str()),
            ("path", facts.path.as_str()),
            ("remote_aet", aet),
        ]);
        Self::evaluate(&self.http_rules, &fields)
    }

    async fn filter_incoming_find_request(&self, facts: &FindRequestFacts) -> bool {
        let fields = HashMap::from([
            ("remote_aet", facts.remote_aet.as_str()),
            ("query_level", facts.query_level.as_str()),
        ]);
        Self::evaluate(&self.find_rules, &fields)
    }

    async fn on_received_instance(&self, _facts: &ReceivedInstanceFacts) -> bool {
        true
    }
}

/// A tiny glob-style matcher (`*` = any run of characters, otherwise
/// literal) so `ScriptedRule` doesn't need a full regex engine for what is
/// usually an AET or path prefix check.
pub mod regex_lite {
    #[derive(Debug, Clone)]
    pub struct Pattern {
        glob: String,
    }

    impl Pattern {
        pub fn new(glob: impl Into<String>) -> Self {
            Self { glob: glob.into() }
        }

        pub fn matches(&self, candidate: &str) -> bool {
            glob_match(&self.glob, candidate)
        }
    }

    fn glob_match(pattern: &str, candidate: &str) -> bool {
        let parts: Vec<&str> = pattern.split('*').collect();
        if parts.len() == 1 {
            return pattern == candidate;
        }

        let mut rest = candidate;
        for (i, part) in parts.iter().enumerate() {
            if part.is_empty() {
                continue;
            }
            if i == 0 {
                if !rest.starts_with(part) {
                    return false;
                }
                rest = &rest[part.len()..];
            } else if i == parts.len() - 1 {
                return rest.ends_with(part);
            } else {
                match rest.find(part) {
                    Some(pos) => rest = &rest[pos + part.len()..],
                    None => return false,
                }
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_script_host_always_allows() {
        let host = NullScriptHost;
        let facts = HttpRequestFacts {
            method: "DELETE".to_string(),
            path: "/studies/1".to_string(),
            remote_aet: None,
        };
        assert!(host.filter_incoming_http_request(&facts).await);
    }

    #[tokio::test]
    async fn scripted_rule_denies_on_matching_row() {
        let rules = vec![Rule {
            field: "method".to_string(),
            pattern: regex_lite::Pattern::new("DELETE"),
            decision: Decision::Deny,
        }];
        let host = ScriptedRule::new(rules, Vec::new());
        let facts = HttpRequestFacts {
            method: "DELETE".to_string(),
            path: "/studies/1".to_string(),
            remote_aet: None,
        };
        assert!(!host.filter_incoming_http_request(&facts).await);
    }

    #[tokio::test]
    async fn scripted_rule_defaults_to_allow_with_no_match() {
        let host = ScriptedRule::new(Vec::new(), Vec::new());
        let facts = HttpRequestFacts {
            method: "GET".to_string(),
            path: "/studies/1".to_string(),
            remote_aet: None,
        };
        assert!(host.filter_incoming_http_request(&facts).await);
    }

    #[test]
    fn glob_pattern_matches_prefix_wildcard() {
        let pattern = regex_lite::Pattern::new("MODALITY_*");
        assert!(pattern.matches("MODALITY_A"));
        assert!(!pattern.matches("OTHER"));
    }
}
