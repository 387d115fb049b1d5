//! Plugin dynamic loading and a stable C ABI are out of scope: this
//! module fixes only the boundary the core publishes events through and
//! the kinds of callback registries a loaded plugin would populate, as a
//! typed trait-object registry tried in registration order until one
//! returns `Some`.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::events::{ChangeEvent, Listener};

/// What a loaded plugin is allowed to register: a REST callback, a
/// storage backend, and a decoder callback, tried in registration order.
#[async_trait]
pub trait RestCallback: Send + Sync {
    async fn try_handle(&self, method: &str, path: &str) -> Option<Vec<u8>>;
}

#[async_trait]
pub trait DecoderCallback: Send + Sync {
    async fn try_decode(&self, transfer_syntax_uid: &str, bytes: &[u8]) -> Option<Vec<u8>>;
}

/// Registry of loaded plugins' callbacks plus the change-event listener
/// each plugin registers through the event bus; actual dynamic-library
/// loading is external to the core.
#[derive(Default)]
pub struct PluginBus {
    rest_callbacks: RwLock<Vec<Arc<dyn RestCallback>>>,
    decoder_callbacks: RwLock<Vec<Arc<dyn DecoderCallback>>>,
}

impl PluginBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register_rest_callback(&self, callback: Arc<dyn RestCallback>) {
        self.rest_callbacks.write().await.push(callback);
    }

    pub async fn register_decoder_callback(&self, callback: Arc<dyn DecoderCallback>) {
        self.decoder_callbacks.write().await.push(callback);
    }

    /// Tries registered REST callbacks in registration order, returning
    /// the first one that produces an answer.
    pub async fn dispatch_rest(&self, method: &str, path: &str) -> Option<Vec<u8>> {
        for callback in self.rest_callbacks.read().await.iter() {
            if let Some(answer) = callback.try_handle(method, path).await {
                return Some(answer);
            }
        }
        None
    }

    pub async fn dispatch_decode(&self, transfer_syntax_uid: &str, bytes: &[u8]) -> Option<Vec<u8>> {
        for callback in self.decoder_callbacks.read().await.iter() {
            if let Some(decoded) = callback.try_decode(transfer_syntax_uid, bytes).await {
                return Some(decoded);
            }
        }
        None
    }
}

/// Forwards change events onto a plugin bus's own subscribers; wired
/// into the [`crate::events::EventBus`] as an ordinary listener so
/// plugins see the same event stream as script hooks.
#[async_trait]
impl Listener for PluginBus {
    async fn on_event(&self, _event: &ChangeEvent) {
        // No plugins are loaded by default; a real deployment wires a
        // `PluginBus` that forwards to loaded native callbacks here.
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FirstCallback;
    #[async_trait]
    impl RestCallback for FirstCallback {
        async fn try_handle(&self, _method: &str, _path: &str) -> Option<Vec<u8>> {
            None
        }
    }

    struct SecondCallback;
    #[async_trait]
    impl RestCallback for SecondCallback {
        async fn try_handle(&self, _method: &str, _path: &str) -> Option<Vec<u8>> {
            Some(b"handled".to_vec())
        }
    }

    #[tokio::test]
    async fn first_matching_callback_wins() {
        let bus = PluginBus::new();
        bus.register_rest_callback(Arc::new(FirstCallback)).await;
        bus.register_rest_callback(Arc::new(SecondCallback)).await;

        let answer = bus.dispatch_rest("GET", "/plugin/route").await;
        assert_eq!(answer, Some(b"handled".to_vec()));
    }

    #[tokio::test]
    async fn no_callbacks_registered_returns_none() {
        let bus = PluginBus::new();
        assert_eq!(bus.dispatch_rest("GET", "/nothing").await, None);
    }
}
