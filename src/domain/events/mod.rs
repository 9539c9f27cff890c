//! Domain events
//!
//! Event types that represent committed spot changes, and the outbound port
//! the reservation service publishes them through. The broadcast
//! implementation lives in `application::events`.

pub mod types;

pub use types::{
    Event, EventMessage, ResyncRequiredEvent, SpotBookedEvent, SpotReleasedEvent,
};

/// Fire-and-forget sink for committed changes. Implementations must not
/// block the writer on subscriber delivery.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: Event);
}

/// Publisher that drops everything. For tests and tools that run the
/// reservation core without a live channel.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPublisher;

impl EventPublisher for NoopPublisher {
    fn publish(&self, _event: Event) {}
}
