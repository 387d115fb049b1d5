//! C11 — event bus: an in-process, synchronous multi-listener broadcaster
//! for change events, consumed by script hooks and the plugin bus,
//! dispatched under a reader/writer lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

/// The four resource levels, each with created/deleted/stable variants,
/// plus metadata and attachment changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    PatientCreated,
    PatientDeleted,
    PatientStable,
    StudyCreated,
    StudyDeleted,
    StudyStable,
    SeriesCreated,
    SeriesDeleted,
    SeriesStable,
    InstanceCreated,
    InstanceDeleted,
    InstanceStable,
    MetadataChanged,
    AttachmentAdded,
}

#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub resource_id: String,
    pub timestamp: DateTime<Utc>,
    /// Monotonic per server, assigned by [`EventBus::publish`] — never by
    /// the producer, since the bus is the sole source of ordering.
    pub sequence: u64,
}

#[async_trait]
pub trait Listener: Send + Sync {
    async fn on_event(&self, event: &ChangeEvent);
}

/// Synchronous-dispatch broadcaster: `publish` awaits every listener in
/// registration order before returning, so a caller observes the event as
/// fully delivered once `publish` resolves (needed for the drain-on-
/// shutdown guarantee).
pub struct EventBus {
    listeners: RwLock<Vec<Arc<dyn Listener>>>,
    next_sequence: AtomicU64,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
            next_sequence: AtomicU64::new(1),
        }
    }

    pub async fn register(&self, listener: Arc<dyn Listener>) {
        self.listeners.write().await.push(listener);
    }

    /// Assigns the next sequence number and dispatches to every listener.
    /// A listener that panics would abort the task; listeners are
    /// expected to report internal failures via logging rather than
    /// panicking, matching "a listener raising an error is logged; it
    /// does not prevent other listeners from receiving the event" —
    /// delivery here is fire-and-forget per listener, not fallible.
    pub async fn publish(&self, kind: ChangeKind, resource_id: impl Into<String>) -> ChangeEvent {
        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst);
        let event = ChangeEvent {
            kind,
            resource_id: resource_id.into(),
            timestamp: Utc::now(),
            sequence,
        };
        let listeners = self.listeners.read().await;
        for listener in listeners.iter() {
            listener.on_event(&event).await;
        }
        tracing::debug!(sequence, kind = ?event.kind, resource = %event.resource_id, "dispatched change event");
        event
    }

    pub async fn listener_count(&self) -> usize {
        self.listeners.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64 as TestCounter;
    use tokio::sync::Mutex;

    struct RecordingListener {
        seen: Mutex<Vec<u64>>,
    }

    #[async_trait]
    impl Listener for RecordingListener {
        async fn on_event(&self, event: &ChangeEvent) {
            self.seen.lock().await.push(event.sequence);
        }
    }

    #[tokio::test]
    async fn listeners_observe_strictly_increasing_sequence_numbers() {
        let bus = EventBus::new();
        let listener = Arc::new(RecordingListener {
            seen: Mutex::new(Vec::new()),
        });
        bus.register(listener.clone()).await;

        bus.publish(ChangeKind::InstanceCreated, "instance-1").await;
        bus.publish(ChangeKind::InstanceStable, "instance-1").await;
        bus.publish(ChangeKind::StudyStable, "study-1").await;

        let seen = listener.seen.lock().await;
        assert_eq!(*seen, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn all_registered_listeners_receive_every_event() {
        let bus = EventBus::new();
        let counter = Arc::new(TestCounter::new(0));

        struct CountingListener(Arc<TestCounter>);
        #[async_trait]
        impl Listener for CountingListener {
            async fn on_event(&self, _event: &ChangeEvent) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        bus.register(Arc::new(CountingListener(counter.clone()))).await;
        bus.register(Arc::new(CountingListener(counter.clone()))).await;
        bus.publish(ChangeKind::SeriesCreated, "series-1").await;

        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn listener_count_reflects_registrations() {
        let bus = EventBus::new();
        assert_eq!(bus.listener_count().await, 0);
        bus.register(Arc::new(RecordingListener {
            seen: Mutex::new(Vec::new()),
        }))
        .await;
        assert_eq!(bus.listener_count().await, 1);
    }
}
