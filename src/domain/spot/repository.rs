//! Spot repository interface
//!
//! The only way to change occupancy is through the two conditional writes
//! below. Both are single atomic operations in every implementation; they
//! report whether their precondition held instead of failing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::model::Spot;
use crate::domain::location::Location;
use crate::domain::DomainResult;

#[async_trait]
pub trait SpotRepository: Send + Sync {
    /// All spots of a location, ordered by spot number
    async fn find_by_location(&self, location_id: i32) -> DomainResult<Vec<Spot>>;

    /// Find one spot
    async fn find(&self, location_id: i32, spot_number: u32) -> DomainResult<Option<Spot>>;

    /// Spots currently booked by `user_id`, ordered by (location, spot number)
    async fn find_booked_by(&self, user_id: &str) -> DomainResult<Vec<Spot>>;

    /// Number of occupied spots at a location
    async fn count_occupied(&self, location_id: i32) -> DomainResult<u32>;

    /// Set the spot to occupied by `user_id` if and only if it is currently
    /// unoccupied. Returns `false` when the precondition did not hold (or the
    /// spot does not exist).
    async fn try_occupy(
        &self,
        location_id: i32,
        spot_number: u32,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> DomainResult<bool>;

    /// Clear the booking if and only if it is held by `user_id`.
    async fn try_release(
        &self,
        location_id: i32,
        spot_number: u32,
        user_id: &str,
    ) -> DomainResult<bool>;

    /// Create any missing spots `1..=total_spots` for the location. Existing
    /// spots keep their occupancy. Returns the number of spots created.
    async fn provision(&self, location: &Location) -> DomainResult<u32>;
}
