//! AET / path allow-list filter, reusing `matchit` directly the way the
//! teacher's `path_filter.rs` does: a set of `matchit` patterns is
//! registered once, and a candidate string either matches one of them or
//! is rejected outright.

use matchit::Router as MatchitRouter;

pub struct AllowList {
    router: MatchitRouter<()>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowListError(pub String);

impl std::fmt::Display for AllowListError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for AllowListError {}

impl AllowList {
    /// An empty rule set allows everything, matching "no AET filter
    /// configured" meaning unrestricted access.
    pub fn new(rules: &[String]) -> Result<Self, AllowListError> {
        let mut router = MatchitRouter::new();
        for rule in rules {
            router
                .insert(rule, ())
                .map_err(|e| AllowListError(format!("invalid allow-list rule '{}': {}", rule, e)))?;
        }
        Ok(Self { router })
    }

    pub fn allows(&self, candidate: &str) -> bool {
        let normalized = if candidate.starts_with('/') {
            candidate.to_string()
        } else {
            format!("/{}", candidate)
        };
        self.router.at(&normalized).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_rule_matches() {
        let list = AllowList::new(&["/MODALITY_A".to_string()]).unwrap();
        assert!(list.allows("/MODALITY_A"));
        assert!(list.allows("MODALITY_A"));
    }

    #[test]
    fn unmatched_aet_is_rejected() {
        let list = AllowList::new(&["/MODALITY_A".to_string()]).unwrap();
        assert!(!list.allows("/MODALITY_B"));
    }

    #[test]
    fn wildcard_rule_matches_a_family() {
        let list = AllowList::new(&["/STUDY/{id}".to_string()]).unwrap();
        assert!(list.allows("/STUDY/42"));
        assert!(!list.allows("/STUDY"));
    }
}
