//! The metadata database is an out-of-scope opaque collaborator: this
//! module only fixes the boundary the core calls through — lookup
//! by identifier, parent/children traversal, main-tag retrieval, and a
//! lookup/apply entry point the DICOM dispatcher (C8) drives its matcher
//! against. [`InMemoryIndex`] is a minimal, non-persistent default useful
//! for tests and for running the crate without a real database plugged
//! in; a production deployment supplies its own `Index` implementation.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use crate::dicom::matcher::Matcher;

pub type Tags = HashMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryLevel {
    Patient,
    Study,
    Series,
    Instance,
}

#[async_trait]
pub trait Index: Send + Sync {
    /// Main DICOM tags stored for a resource, or `None` if unknown.
    async fn main_tags(&self, resource_id: &str) -> Option<Tags>;

    async fn parent(&self, resource_id: &str) -> Option<String>;

    async fn children(&self, resource_id: &str) -> Vec<String>;

    /// Resource ids at `level` whose stored tags satisfy `matcher`.
    async fn apply(&self, level: QueryLevel, matcher: &Matcher) -> Vec<String>;

    /// Registers a freshly stored instance under its own id, with its
    /// containing series/study/patient ids recorded for traversal.
    async fn insert_instance(&self, instance_id: &str, tags: Tags, parent_id: Option<&str>);
}

struct Resource {
    tags: Tags,
    parent: Option<String>,
    children: Vec<String>,
}

/// Non-persistent `Index`: a flat resource table guarded by a single
/// `RwLock`, good enough for tests and single-process demos; restart
/// persistence is squarely the opaque Index's job, not this stand-in's.
#[derive(Default)]
pub struct InMemoryIndex {
    resources: RwLock<HashMap<String, Resource>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Index for InMemoryIndex {
    async fn main_tags(&self, resource_id: &str) -> Option<Tags> {
        self.resources
            .read()
            .unwrap()
            .get(resource_id)
            .map(|r| r.tags.clone())
    }

    async fn parent(&self, resource_id: &str) -> Option<String> {
        self.resources
            .read()
            .unwrap()
            .get(resource_id)
            .and_then(|r| r.parent.clone())
    }

    async fn children(&self, resource_id: &str) -> Vec<String> {
        self.resources
            .read()
            .unwrap()
            .get(resource_id)
            .map(|r| r.children.clone())
            .unwrap_or_default()
    }

    async fn apply(&self, _level: QueryLevel, matcher: &Matcher) -> Vec<String> {
        self.resources
            .read()
            .unwrap()
            .iter()
            .filter(|(_, resource)| matcher.matches(&resource.tags))
            .map(|(id, _)| id.clone())
            .collect()
    }

    async fn insert_instance(&self, instance_id: &str, tags: Tags, parent_id: Option<&str>) {
        let mut resources = self.resources.write().unwrap();
        resources.insert(
            instance_id.to_string(),
            Resource {
                tags,
                parent: parent_id.map(str::to_string),
                children: Vec::new(),
            },
        );
        if let Some(parent_id) = parent_id {
            resources
                .entry(parent_id.to_string())
                .or_insert_with(|| Resource {
                    tags: Tags::new(),
                    parent: None,
                    children: Vec::new(),
                })
                .children
                .push(instance_id.to_string());
        }
    }
}

/// Generates a fresh resource id the way new instances are named when no
/// caller-supplied identifier is available.
pub fn new_resource_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dicom::matcher::Matcher;

    #[tokio::test]
    async fn apply_returns_only_matching_resources() {
        let index = InMemoryIndex::new();
        let mut tags_a = Tags::new();
        tags_a.insert("PatientID".to_string(), "A1".to_string());
        index.insert_instance("inst-a", tags_a, Some("series-1")).await;

        let mut tags_b = Tags::new();
        tags_b.insert("PatientID".to_string(), "B1".to_string());
        index.insert_instance("inst-b", tags_b, Some("series-1")).await;

        let mut query = Tags::new();
        query.insert("PatientID".to_string(), "A1".to_string());
        let matcher = Matcher::from_query(&query);

        let matches = index.apply(QueryLevel::Instance, &matcher).await;
        assert_eq!(matches, vec!["inst-a".to_string()]);
    }

    #[tokio::test]
    async fn children_and_parent_are_recorded_on_insert() {
        let index = InMemoryIndex::new();
        index
            .insert_instance("inst-a", Tags::new(), Some("series-1"))
            .await;

        assert_eq!(index.parent("inst-a").await, Some("series-1".to_string()));
        assert_eq!(index.children("series-1").await, vec!["inst-a".to_string()]);
    }
}
