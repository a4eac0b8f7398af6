//! Event types and broadcast bus for the Cartwise event system

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Payload published when a customer's segment assignment changes
/// (or is created for the first time).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentChangeEvent {
    /// Customer whose assignment changed
    pub customer_id: Uuid,
    /// Previous segment identifier, `None` for a first-ever assignment
    pub previous_segment: Option<String>,
    /// Display name of the newly assigned segment
    pub new_segment: String,
    /// Confidence of the new assignment (0.0-1.0)
    pub confidence: f32,
    /// Machine-readable reason codes explaining the classification
    pub reason_codes: Vec<String>,
    /// When the assignment was made
    pub timestamp: DateTime<Utc>,
    /// Version tag of the segmentation model that produced the assignment
    pub model_version: String,
}

/// Cartwise event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CartwiseEvent {
    /// Customer segment assignment changed or was created
    SegmentChanged(SegmentChangeEvent),
}

/// Broadcast event bus shared across Cartwise services.
///
/// Built on `tokio::sync::broadcast`, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
/// - Lagged message detection for slow subscribers
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<CartwiseEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the specified channel capacity.
    ///
    /// Events beyond capacity evict the oldest buffered event; lagged
    /// subscribers observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events.
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<CartwiseEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers.
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists,
    /// `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: CartwiseEvent,
    ) -> Result<usize, broadcast::error::SendError<CartwiseEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening.
    ///
    /// Useful for non-critical events where it is acceptable if no
    /// component is currently listening.
    pub fn emit_lossy(&self, event: CartwiseEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("Event emitted with no active subscribers");
        }
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
