//! # Domain Events
//!
//! Fire-and-forget notifications for interested observers (UI refresh,
//! reporting caches). Delivery is at-most-once and best-effort: publishing
//! with no subscribers is a no-op, never an error, and a slow subscriber
//! that falls behind simply misses events (broadcast ring buffer).
//!
//! ## Flow
//! ```text
//! SaleProcessor ──┐
//!                 ├──▶ EventBus (tokio broadcast) ──▶ N subscribers
//! StockOperations ┘
//! ```

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::trace;

use almacen_core::{MovementType, Sale};

/// Default capacity of the broadcast ring buffer.
const DEFAULT_CAPACITY: usize = 128;

// =============================================================================
// Events
// =============================================================================

/// Events emitted by engine services after a completed operation.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum DomainEvent {
    /// A sale was persisted. Carries the full sale as observers would
    /// otherwise re-read it immediately.
    SaleCreated { sale: Sale },

    /// An inventory quantity changed.
    StockUpdated {
        product_id: String,
        branch_id: String,
        /// Quantity after the change.
        quantity: i64,
        movement_type: MovementType,
    },
}

// =============================================================================
// Event Bus
// =============================================================================

/// Broadcast channel for domain events.
///
/// Cheap to clone; all clones publish into the same channel.
///
/// ## Usage
/// ```rust,ignore
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(DomainEvent::StockUpdated { .. });
/// let event = rx.recv().await?;
/// ```
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DomainEvent>,
}

impl EventBus {
    /// Creates a bus with a given ring-buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        EventBus { tx }
    }

    /// Subscribes to all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.tx.subscribe()
    }

    /// Publishes an event to current subscribers.
    ///
    /// Never fails: the send error (no active subscribers) is dropped on
    /// purpose.
    pub fn publish(&self, event: DomainEvent) {
        trace!(?event, "Publishing domain event");
        let _ = self.tx.send(event);
    }

    /// Number of active subscribers (diagnostics).
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        EventBus::new(DEFAULT_CAPACITY)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_without_subscribers_is_noop() {
        let bus = EventBus::default();
        assert_eq!(bus.subscriber_count(), 0);

        // Must not panic or error
        bus.publish(DomainEvent::StockUpdated {
            product_id: "p-1".to_string(),
            branch_id: "b-1".to_string(),
            quantity: 10,
            movement_type: MovementType::In,
        });
    }

    #[tokio::test]
    async fn test_subscriber_receives_event() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(DomainEvent::StockUpdated {
            product_id: "p-1".to_string(),
            branch_id: "b-1".to_string(),
            quantity: 7,
            movement_type: MovementType::Sale,
        });

        match rx.recv().await.unwrap() {
            DomainEvent::StockUpdated { quantity, .. } => assert_eq!(quantity, 7),
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
