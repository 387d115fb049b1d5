//! C-FIND: build a hierarchical matcher from the query identifier,
//! apply it through the Index, and project each match back onto the
//! requested tag set.

use crate::error::Result;
use crate::index::{Index, QueryLevel, Tags};
use crate::policy::{FindRequestFacts, ScriptHost};

use super::matcher::Matcher;

pub struct FindRequest {
    pub level: QueryLevel,
    pub remote_aet: String,
    pub query: Tags,
}

pub struct FindAnswer {
    pub matches: Vec<Tags>,
}

/// Runs the scripted find-request filter (which may rewrite the query)
/// before applying the matcher to the Index.
pub async fn handle_find(
    index: &dyn Index,
    script_host: &dyn ScriptHost,
    request: FindRequest,
) -> Result<FindAnswer> {
    let query_level = level_name(request.level).to_string();
    let facts = FindRequestFacts {
        remote_aet: request.remote_aet.clone(),
        query_level,
    };
    if !script_host.filter_incoming_find_request(&facts).await {
        return Err(crate::error::CoreError::Unauthorized(
            "find request rejected by script filter".to_string(),
        ));
    }

    let matcher = Matcher::from_query(&request.query);
    let ids = index.apply(request.level, &matcher).await;

    let mut matches = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(tags) = index.main_tags(&id).await {
            matches.push(matcher.project(&tags));
        }
    }
    Ok(FindAnswer { matches })
}

fn level_name(level: QueryLevel) -> &'static str {
    match level {
        QueryLevel::Patient => "PATIENT",
        QueryLevel::Study => "STUDY",
        QueryLevel::Series => "SERIES",
        QueryLevel::Instance => "INSTANCE",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::InMemoryIndex;
    use crate::policy::NullScriptHost;

    #[tokio::test]
    async fn find_projects_matching_instances_onto_the_query_tags() {
        let index = InMemoryIndex::new();
        let mut tags = Tags::new();
        tags.insert("PatientID".to_string(), "A1".to_string());
        tags.insert("StudyDate".to_string(), "20200101".to_string());
        index.insert_instance("inst-a", tags, None).await;

        let mut query = Tags::new();
        query.insert("PatientID".to_string(), "A1".to_string());
        let request = FindRequest {
            level: QueryLevel::Instance,
            remote_aet: "REMOTE".to_string(),
            query,
        };

        let answer = handle_find(&index, &NullScriptHost, request).await.unwrap();
        assert_eq!(answer.matches.len(), 1);
        assert_eq!(answer.matches[0].get("PatientID"), Some(&"A1".to_string()));
        assert!(!answer.matches[0].contains_key("StudyDate"));
    }
}
