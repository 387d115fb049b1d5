//! Hierarchical DICOM matcher: a two-layer tree of flat tag constraints
//! plus nested matchers for sequence tags, built from a query and usable
//! either as a predicate against a dataset or as an extractor projecting
//! a dataset onto the matcher's tag universe.

use std::collections::HashMap;

use crate::index::Tags;

/// Tags conventionally compared case-insensitively unless the caller
/// opts into case-sensitive matching.
const CASE_INSENSITIVE_TAGS: &[&str] = &["PatientName", "ReferringPhysicianName", "OperatorsName"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    Universal,
    Exact(String),
    Range {
        lower: Option<String>,
        upper: Option<String>,
    },
    Wildcard(String),
    MultiValue(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct TagConstraint {
    pub constraint: Constraint,
    pub case_sensitive: bool,
}

#[derive(Debug, Clone, Default)]
pub struct Matcher {
    constraints: HashMap<String, TagConstraint>,
    sequences: HashMap<String, Matcher>,
}

impl Matcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a matcher from a flat query: one non-empty tag per
    /// constraint. Length and encoding pseudo-tags are the caller's
    /// responsibility to have already stripped (the DICOM dispatcher does
    /// this before calling in).
    pub fn from_query(fields: &Tags) -> Self {
        let mut constraints = HashMap::new();
        for (tag, value) in fields {
            if value.is_empty() {
                continue;
            }
            constraints.insert(tag.clone(), parse_constraint(tag, value));
        }
        Self {
            constraints,
            sequences: HashMap::new(),
        }
    }

    pub fn with_sequence(mut self, tag: impl Into<String>, nested: Matcher) -> Self {
        self.sequences.insert(tag.into(), nested);
        self
    }

    pub fn is_universal(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Evaluates the matcher as a predicate: every constrained tag
    /// present in the matcher must be satisfied by `dataset`.
    pub fn matches(&self, dataset: &Tags) -> bool {
        self.constraints.iter().all(|(tag, constraint)| {
            let value = dataset.get(tag).map(String::as_str).unwrap_or("");
            evaluate(constraint, value)
        })
    }

    /// Projects `dataset` onto the matcher's tag universe: the extractor
    /// half of the contract, used to build a C-FIND answer.
    pub fn project(&self, dataset: &Tags) -> Tags {
        self.constraints
            .keys()
            .filter_map(|tag| dataset.get(tag).map(|value| (tag.clone(), value.clone())))
            .collect()
    }
}

fn parse_constraint(tag: &str, value: &str) -> TagConstraint {
    let case_sensitive = !CASE_INSENSITIVE_TAGS.contains(&tag);
    let constraint = if value == "*" {
        Constraint::Universal
    } else if value.contains('\\') {
        Constraint::MultiValue(value.split('\\').map(str::to_string).collect())
    } else if let Some(dash) = value.find('-') {
        // DICOM date/time range syntax: "lower-upper", "-upper", "lower-".
        let lower = &value[..dash];
        let upper = &value[dash + 1..];
        Constraint::Range {
            lower: if lower.is_empty() { None } else { Some(lower.to_string()) },
            upper: if upper.is_empty() { None } else { Some(upper.to_string()) },
        }
    } else if value.contains('*') || value.contains('?') {
        Constraint::Wildcard(value.to_string())
    } else {
        Constraint::Exact(value.to_string())
    };
    TagConstraint {
        constraint,
        case_sensitive,
    }
}

fn evaluate(constraint: &TagConstraint, value: &str) -> bool {
    match &constraint.constraint {
        Constraint::Universal => true,
        Constraint::Exact(expected) => compare_eq(expected, value, constraint.case_sensitive),
        Constraint::Range { lower, upper } => {
            lower.as_deref().map_or(true, |l| value >= l) && upper.as_deref().map_or(true, |u| value <= u)
        }
        Constraint::Wildcard(pattern) => wildcard_match(pattern, value, constraint.case_sensitive),
        Constraint::MultiValue(values) => values
            .iter()
            .any(|expected| compare_eq(expected, value, constraint.case_sensitive)),
    }
}

fn compare_eq(expected: &str, actual: &str, case_sensitive: bool) -> bool {
    if case_sensitive {
        expected == actual
    } else {
        expected.eq_ignore_ascii_case(actual)
    }
}

/// DICOM wildcard matching: `*` matches any run (including empty), `?`
/// matches exactly one character.
fn wildcard_match(pattern: &str, candidate: &str, case_sensitive: bool) -> bool {
    let (pattern, candidate): (String, String) = if case_sensitive {
        (pattern.to_string(), candidate.to_string())
    } else {
        (pattern.to_lowercase(), candidate.to_lowercase())
    };
    wildcard_match_bytes(pattern.as_bytes(), candidate.as_bytes())
}

fn wildcard_match_bytes(pattern: &[u8], candidate: &[u8]) -> bool {
    match pattern.first() {
        None => candidate.is_empty(),
        Some(b'*') => {
            wildcard_match_bytes(&pattern[1..], candidate)
                || (!candidate.is_empty() && wildcard_match_bytes(pattern, &candidate[1..]))
        }
        Some(b'?') => !candidate.is_empty() && wildcard_match_bytes(&pattern[1..], &candidate[1..]),
        Some(&c) => {
            !candidate.is_empty() && candidate[0] == c && wildcard_match_bytes(&pattern[1..], &candidate[1..])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(pairs: &[(&str, &str)]) -> Tags {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn exact_constraint_matches_only_identical_value() {
        let matcher = Matcher::from_query(&tags(&[("PatientID", "A1")]));
        assert!(matcher.matches(&tags(&[("PatientID", "A1")])));
        assert!(!matcher.matches(&tags(&[("PatientID", "A2")])));
    }

    #[test]
    fn wildcard_constraint_matches_prefix() {
        let matcher = Matcher::from_query(&tags(&[("PatientID", "A*")]));
        assert!(matcher.matches(&tags(&[("PatientID", "A123")])));
        assert!(!matcher.matches(&tags(&[("PatientID", "B123")])));
    }

    #[test]
    fn range_constraint_is_inclusive_on_both_bounds() {
        let matcher = Matcher::from_query(&tags(&[("StudyDate", "20200101-20201231")]));
        assert!(matcher.matches(&tags(&[("StudyDate", "20200615")])));
        assert!(!matcher.matches(&tags(&[("StudyDate", "20210101")])));
    }

    #[test]
    fn patient_name_matches_case_insensitively() {
        let matcher = Matcher::from_query(&tags(&[("PatientName", "DOE^JOHN")]));
        assert!(matcher.matches(&tags(&[("PatientName", "doe^john")])));
    }

    #[test]
    fn project_extracts_only_queried_tags() {
        let matcher = Matcher::from_query(&tags(&[("PatientID", "*")]));
        let projected = matcher.project(&tags(&[("PatientID", "A1"), ("StudyDate", "20200101")]));
        assert_eq!(projected.len(), 1);
        assert_eq!(projected.get("PatientID"), Some(&"A1".to_string()));
    }

    #[test]
    fn empty_query_is_universal_and_matches_any_dataset() {
        let matcher = Matcher::from_query(&Tags::new());
        assert!(matcher.is_universal());
        assert!(matcher.matches(&tags(&[("PatientID", "anything")])));
    }
}
