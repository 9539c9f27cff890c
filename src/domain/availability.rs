//! Availability derivation
//!
//! Pure functions over a location and its spots. Nothing here is cached:
//! callers recompute after every change notification.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::location::Location;
use super::spot::Spot;

/// Free vs. total spots at a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Availability {
    pub available: u32,
    pub total: u32,
}

impl Availability {
    pub fn from_occupied(location: &Location, occupied: u32) -> Self {
        Self {
            available: location.total_spots.saturating_sub(occupied),
            total: location.total_spots,
        }
    }

    pub fn occupied(&self) -> u32 {
        self.total - self.available
    }

    pub fn is_full(&self) -> bool {
        self.available == 0
    }
}

/// `available = total_spots - occupied spots`.
pub fn compute_availability(location: &Location, spots: &[Spot]) -> Availability {
    let occupied = spots
        .iter()
        .filter(|s| s.location_id == location.id && s.is_occupied)
        .count() as u32;
    Availability::from_occupied(location, occupied)
}

/// Badge shown next to a location in listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AvailabilityLevel {
    High,
    Medium,
    Low,
    Full,
}

/// Display thresholds. Policy only; correctness never depends on them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AvailabilityThresholds {
    /// More than this many free spots is `High`
    pub high_above: u32,
    /// More than this many free spots is `Medium`
    pub medium_above: u32,
}

impl Default for AvailabilityThresholds {
    fn default() -> Self {
        Self {
            high_above: 10,
            medium_above: 5,
        }
    }
}

impl AvailabilityThresholds {
    pub fn classify(&self, availability: &Availability) -> AvailabilityLevel {
        match availability.available {
            0 => AvailabilityLevel::Full,
            n if n > self.high_above => AvailabilityLevel::High,
            n if n > self.medium_above => AvailabilityLevel::Medium,
            _ => AvailabilityLevel::Low,
        }
    }
}
