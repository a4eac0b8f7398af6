//! Segment change notification collaborator
//!
//! Fire-and-forget from the orchestrator's perspective: publish
//! failures are logged and swallowed, never surfaced to the caller.

use crate::error::Result;
use async_trait::async_trait;
use cartwise_common::events::{CartwiseEvent, EventBus, SegmentChangeEvent};

/// Publisher of segment change events.
#[async_trait]
pub trait ChangeNotifier: Send + Sync {
    async fn publish(&self, event: SegmentChangeEvent) -> Result<()>;
}

/// Notifier backed by the shared broadcast EventBus.
#[derive(Clone)]
pub struct EventBusNotifier {
    bus: EventBus,
}

impl EventBusNotifier {
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl ChangeNotifier for EventBusNotifier {
    async fn publish(&self, event: SegmentChangeEvent) -> Result<()> {
        tracing::info!(
            customer_id = %event.customer_id,
            previous = event.previous_segment.as_deref().unwrap_or("none"),
            new = %event.new_segment,
            "Publishing segment change event"
        );
        self.bus.emit_lossy(CartwiseEvent::SegmentChanged(event));
        Ok(())
    }
}
