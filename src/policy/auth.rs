//! HTTP authentication: Basic auth against the configured user table, or
//! an opaque bearer token checked against the process-wide token set
//! (`crate::globals`). The token set is the one piece of truly global,
//! cross-association state the engine needs, so it stays behind
//! `crate::globals` rather than threaded through every call.

use std::collections::HashMap;

use base64::{engine::general_purpose, Engine as _};

use crate::error::CoreError;

pub enum AuthOutcome {
    Anonymous,
    BasicUser(String),
    BearerToken,
}

pub fn authenticate(
    headers: &HashMap<String, String>,
    basic_auth_users: &HashMap<String, String>,
) -> Result<AuthOutcome, CoreError> {
    let Some(auth_header) = headers.get("authorization") else {
        return Ok(AuthOutcome::Anonymous);
    };

    if let Some(token) = auth_header.strip_prefix("Bearer ") {
        if crate::globals::is_authorized_token(token) {
            return Ok(AuthOutcome::BearerToken);
        }
        return Err(CoreError::Unauthorized("invalid bearer token".to_string()));
    }

    if let Some(encoded) = auth_header.strip_prefix("Basic ") {
        let (user, password) = decode_basic(encoded)
            .ok_or_else(|| CoreError::Unauthorized("malformed Basic header".to_string()))?;
        match basic_auth_users.get(&user) {
            Some(expected) if expected == &password => Ok(AuthOutcome::BasicUser(user)),
            _ => Err(CoreError::Unauthorized("bad credentials".to_string())),
        }
    } else {
        Err(CoreError::Unauthorized(
            "unsupported Authorization scheme".to_string(),
        ))
    }
}

fn decode_basic(encoded: &str) -> Option<(String, String)> {
    let decoded = general_purpose::STANDARD.decode(encoded).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (user, password) = text.split_once(':')?;
    Some((user.to_string(), password.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_when_no_header() {
        let headers = HashMap::new();
        let users = HashMap::new();
        assert!(matches!(
            authenticate(&headers, &users).unwrap(),
            AuthOutcome::Anonymous
        ));
    }

    #[test]
    fn basic_auth_accepts_matching_credentials() {
        let mut headers = HashMap::new();
        // echo -n "alice:secret" | base64 => YWxpY2U6c2VjcmV0
        headers.insert("authorization".to_string(), "Basic YWxpY2U6c2VjcmV0".to_string());
        let mut users = HashMap::new();
        users.insert("alice".to_string(), "secret".to_string());

        match authenticate(&headers, &users).unwrap() {
            AuthOutcome::BasicUser(user) => assert_eq!(user, "alice"),
            _ => panic!("expected BasicUser"),
        }
    }

    #[test]
    fn basic_auth_rejects_wrong_password() {
        let mut headers = HashMap::new();
        headers.insert("authorization".to_string(), "Basic YWxpY2U6c2VjcmV0".to_string());
        let mut users = HashMap::new();
        users.insert("alice".to_string(), "different".to_string());

        assert!(authenticate(&headers, &users).is_err());
    }
}
