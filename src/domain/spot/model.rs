//! Spot domain entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Occupancy state of a single spot, as seen by the booking state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpotState {
    Available,
    OccupiedBy(String),
}

/// How a spot looks to one particular viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SpotStatus {
    Available,
    Selected,
    /// Booked by the viewer
    Mine,
    /// Booked by someone else
    Occupied,
}

impl SpotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Selected => "selected",
            Self::Mine => "mine",
            Self::Occupied => "occupied",
        }
    }
}

impl std::fmt::Display for SpotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A numbered parking space within a location.
///
/// `is_occupied` is true exactly when `booked_by` is set; `booking_start`
/// follows `booked_by`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spot {
    pub location_id: i32,
    pub spot_number: u32,
    pub is_occupied: bool,
    pub booked_by: Option<String>,
    pub booking_start: Option<DateTime<Utc>>,
}

impl Spot {
    /// A freshly provisioned, unoccupied spot.
    pub fn available(location_id: i32, spot_number: u32) -> Self {
        Self {
            location_id,
            spot_number,
            is_occupied: false,
            booked_by: None,
            booking_start: None,
        }
    }

    pub fn state(&self) -> SpotState {
        match &self.booked_by {
            Some(owner) => SpotState::OccupiedBy(owner.clone()),
            None => SpotState::Available,
        }
    }

    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.booked_by.as_deref() == Some(user_id)
    }

    /// Free spots are selectable by anyone; an occupied spot only by its
    /// owner (so the booking can be cancelled).
    pub fn is_selectable_by(&self, user_id: &str) -> bool {
        !self.is_occupied || self.is_owned_by(user_id)
    }

    /// Display status for `viewer`, given the spot the viewer has selected.
    pub fn status_for(&self, viewer: &str, selected: Option<u32>) -> SpotStatus {
        if self.is_owned_by(viewer) {
            SpotStatus::Mine
        } else if self.is_occupied {
            SpotStatus::Occupied
        } else if selected == Some(self.spot_number) {
            SpotStatus::Selected
        } else {
            SpotStatus::Available
        }
    }

    /// Occupancy flag, owner and start time agree with each other.
    pub fn is_consistent(&self) -> bool {
        self.is_occupied == self.booked_by.is_some()
            && self.booked_by.is_some() == self.booking_start.is_some()
    }

    pub(crate) fn occupy(&mut self, user_id: &str, at: DateTime<Utc>) {
        self.is_occupied = true;
        self.booked_by = Some(user_id.to_string());
        self.booking_start = Some(at);
    }

    pub(crate) fn release(&mut self) {
        self.is_occupied = false;
        self.booked_by = None;
        self.booking_start = None;
    }
}

// ── Tests ──────────────────────────────────────────────────────
