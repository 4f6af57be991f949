//! Cache event bus
//!
//! The controller publishes what it does so a UI layer can redraw without
//! polling. Uses `tokio::sync::broadcast`: publishing never blocks, slow
//! subscribers get `Lagged` instead of back-pressuring the cache.
//!
//! ```text
//! PaginationController ──▶ CacheEvents::publish() ──▶ broadcast ──▶ list view
//! EditMerger ──────────┘                                       ──▶ editor form
//! GeneratorTask ───────┘                                       ──▶ progress bar
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! let mut rx = controller.events().subscribe();
//! while let Ok(envelope) = rx.recv().await {
//!     if let CacheEvent::PageMerged { loaded, .. } = envelope.event {
//!         redraw(loaded);
//!     }
//! }
//! ```

use crate::cache::controller::LoadState;
use crate::core::user::User;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

/// Something observable happened in the cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CacheEvent {
    /// The controller moved between load states
    StateChanged { from: LoadState, to: LoadState },

    /// A fetched page was merged into the collection
    PageMerged {
        page: usize,
        added: usize,
        loaded: usize,
        total_count: usize,
    },

    /// Filter, sort or page size changed; the view must be re-read
    ViewInvalidated { reason: String },

    /// An edit was acknowledged and applied
    UserUpdated { user: User },

    /// The collection was cleared
    Reset,

    /// The background generator produced more records
    GeneratorProgress { loaded: usize, total: usize },
}

impl CacheEvent {
    /// Short name of the event, for logs
    pub fn kind(&self) -> &'static str {
        match self {
            CacheEvent::StateChanged { .. } => "state_changed",
            CacheEvent::PageMerged { .. } => "page_merged",
            CacheEvent::ViewInvalidated { .. } => "view_invalidated",
            CacheEvent::UserUpdated { .. } => "user_updated",
            CacheEvent::Reset => "reset",
            CacheEvent::GeneratorProgress { .. } => "generator_progress",
        }
    }
}

/// Envelope wrapping a cache event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique event ID
    pub id: Uuid,
    /// When the event occurred
    pub timestamp: DateTime<Utc>,
    /// The actual event
    pub event: CacheEvent,
}

impl EventEnvelope {
    pub fn new(event: CacheEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event,
        }
    }
}

/// Broadcast bus for cache events
///
/// Cheap to clone; all clones publish to the same subscribers.
#[derive(Debug, Clone)]
pub struct CacheEvents {
    sender: broadcast::Sender<EventEnvelope>,
}

impl CacheEvents {
    /// Create a bus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event, returning how many subscribers will see it
    pub fn publish(&self, event: CacheEvent) -> usize {
        tracing::trace!(kind = event.kind(), "cache event");
        // send() returns Err only if there are no receivers, which is fine
        self.sender.send(EventEnvelope::new(event)).unwrap_or(0)
    }

    /// Subscribe to future events
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    /// Subscribe as a `Stream`
    pub fn stream(&self) -> BroadcastStream<EventEnvelope> {
        BroadcastStream::new(self.sender.subscribe())
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for CacheEvents {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = CacheEvent::PageMerged {
            page: 1,
            added: 50,
            loaded: 100,
            total_count: 500,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "page_merged");
        assert_eq!(json["loaded"], 100);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = CacheEvents::new(4);
        assert_eq!(bus.publish(CacheEvent::Reset), 0);
    }

    #[tokio::test]
    async fn test_publish_subscribe() {
        let bus = CacheEvents::new(4);
        let mut rx = bus.subscribe();

        assert_eq!(bus.publish(CacheEvent::Reset), 1);

        let envelope = rx.recv().await.unwrap();
        assert_eq!(envelope.event, CacheEvent::Reset);
        assert!(!envelope.id.is_nil());
    }

    #[tokio::test]
    async fn test_stream_receives_events() {
        let bus = CacheEvents::default();
        let mut stream = bus.stream();

        bus.publish(CacheEvent::GeneratorProgress {
            loaded: 10,
            total: 20,
        });

        let envelope = stream.next().await.unwrap().unwrap();
        assert_eq!(envelope.event.kind(), "generator_progress");
    }

    #[test]
    fn test_clone_shares_subscribers() {
        let bus = CacheEvents::new(4);
        let _rx = bus.subscribe();
        let clone = bus.clone();
        assert_eq!(clone.receiver_count(), 1);
    }
}
