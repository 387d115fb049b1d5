//! The two pieces of genuinely process-wide state: the authorization
//! token set and the event bus are the rare exceptions to an otherwise
//! explicitly-threaded design. Everything else — config, storage, jobs,
//! script host — is threaded explicitly through `Arc<ServerContext>`,
//! never looked up through here.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;

use crate::events::EventBus;

static AUTHORIZATION_TOKENS: Lazy<RwLock<HashSet<String>>> = Lazy::new(|| RwLock::new(HashSet::new()));
static EVENT_BUS: Lazy<Arc<EventBus>> = Lazy::new(|| Arc::new(EventBus::new()));

/// Registers a bearer token created for a plugin or internal component;
/// lives until [`revoke_authorization_token`] or process exit. Not
/// persisted across restarts.
pub fn register_authorization_token(token: impl Into<String>) {
    AUTHORIZATION_TOKENS.write().unwrap().insert(token.into());
}

pub fn revoke_authorization_token(token: &str) {
    AUTHORIZATION_TOKENS.write().unwrap().remove(token);
}

pub fn is_authorized_token(token: &str) -> bool {
    AUTHORIZATION_TOKENS.read().unwrap().contains(token)
}

/// The single process-wide event bus every subsystem publishes change
/// events through and every listener (script hooks, plugins) subscribes
/// to.
pub fn event_bus() -> Arc<EventBus> {
    Arc::clone(&EVENT_BUS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registered_token_is_authorized_until_revoked() {
        register_authorization_token("tok-123");
        assert!(is_authorized_token("tok-123"));
        revoke_authorization_token("tok-123");
        assert!(!is_authorized_token("tok-123"));
    }

    #[test]
    fn unknown_token_is_not_authorized() {
        assert!(!is_authorized_token("never-registered"));
    }
}
