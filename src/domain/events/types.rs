//! Live-update events
//!
//! Every committed booking change produces one event scoped to its location.
//! Payloads are hints: receivers re-read the lot rather than patching state
//! from the event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Event {
    SpotBooked(SpotBookedEvent),
    SpotReleased(SpotReleasedEvent),
    /// Changes may have been missed (the subscriber lagged, or a write timed
    /// out with an unknown outcome); re-read everything.
    ResyncRequired(ResyncRequiredEvent),
}

impl Event {
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::SpotBooked(_) => "spot_booked",
            Event::SpotReleased(_) => "spot_released",
            Event::ResyncRequired(_) => "resync_required",
        }
    }

    pub fn location_id(&self) -> i32 {
        match self {
            Event::SpotBooked(e) => e.location_id,
            Event::SpotReleased(e) => e.location_id,
            Event::ResyncRequired(e) => e.location_id,
        }
    }

    pub fn spot_number(&self) -> Option<u32> {
        match self {
            Event::SpotBooked(e) => Some(e.spot_number),
            Event::SpotReleased(e) => Some(e.spot_number),
            Event::ResyncRequired(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotBookedEvent {
    pub location_id: i32,
    pub spot_number: u32,
    pub booked_by: String,
    pub booking_start: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotReleasedEvent {
    pub location_id: i32,
    pub spot_number: u32,
    pub released_by: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResyncRequiredEvent {
    pub location_id: i32,
    pub missed: u64,
}

/// Wrapper for sending events with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMessage {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: Event,
}

impl EventMessage {
    pub fn new(event: Event) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event,
        }
    }
}
