//! Read side: locations, lots and their availability

use std::sync::Arc;

use tracing::debug;

use crate::domain::{
    compute_availability, Availability, AvailabilityLevel, AvailabilityThresholds, DomainError,
    DomainResult, Location, RepositoryProvider, Spot,
};
use crate::shared::{retry_with_backoff, RetryConfig};

/// One row of the location listing
#[derive(Debug, Clone, PartialEq)]
pub struct LocationOverview {
    pub location: Location,
    pub availability: Availability,
    pub level: AvailabilityLevel,
}

/// A location with every spot, read at one point in time
#[derive(Debug, Clone, PartialEq)]
pub struct LotSnapshot {
    pub location: Location,
    pub spots: Vec<Spot>,
    pub availability: Availability,
    pub level: AvailabilityLevel,
}

impl LotSnapshot {
    pub fn spot(&self, spot_number: u32) -> Option<&Spot> {
        self.spots.iter().find(|s| s.spot_number == spot_number)
    }

    /// Replace one spot after a committed change and recompute availability.
    pub(crate) fn apply(&mut self, spot: Spot, thresholds: &AvailabilityThresholds) {
        if let Some(slot) = self
            .spots
            .iter_mut()
            .find(|s| s.spot_number == spot.spot_number)
        {
            *slot = spot;
        }
        self.availability = compute_availability(&self.location, &self.spots);
        self.level = thresholds.classify(&self.availability);
    }
}

/// Lot queries. Every read goes to the store; availability is never cached.
pub struct LotService {
    repos: Arc<dyn RepositoryProvider>,
    thresholds: AvailabilityThresholds,
    retry: RetryConfig,
}

impl LotService {
    pub fn new(repos: Arc<dyn RepositoryProvider>) -> Self {
        Self {
            repos,
            thresholds: AvailabilityThresholds::default(),
            retry: RetryConfig::default(),
        }
    }

    pub fn with_thresholds(mut self, thresholds: AvailabilityThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn thresholds(&self) -> &AvailabilityThresholds {
        &self.thresholds
    }

    pub async fn list_locations_with_availability(&self) -> DomainResult<Vec<LocationOverview>> {
        let locations = retry_with_backoff(
            self.retry.clone(),
            || self.repos.locations().find_all(),
            DomainError::is_transient,
            "list_locations",
        )
        .await?;

        let mut overviews = Vec::with_capacity(locations.len());
        for location in locations {
            let occupied = retry_with_backoff(
                self.retry.clone(),
                || self.repos.spots().count_occupied(location.id),
                DomainError::is_transient,
                "count_occupied",
            )
            .await?;
            let availability = Availability::from_occupied(&location, occupied);
            overviews.push(LocationOverview {
                level: self.thresholds.classify(&availability),
                availability,
                location,
            });
        }
        Ok(overviews)
    }

    pub async fn get_location(&self, location_id: i32) -> DomainResult<Location> {
        retry_with_backoff(
            self.retry.clone(),
            || self.repos.locations().find_by_id(location_id),
            DomainError::is_transient,
            "get_location",
        )
        .await?
        .ok_or_else(|| DomainError::not_found("Location", "id", location_id))
    }

    /// Location, all of its spots in number order, and availability
    pub async fn get_lot(&self, location_id: i32) -> DomainResult<LotSnapshot> {
        let location = self.get_location(location_id).await?;
        let spots = retry_with_backoff(
            self.retry.clone(),
            || self.repos.spots().find_by_location(location_id),
            DomainError::is_transient,
            "get_spots",
        )
        .await?;

        let availability = compute_availability(&location, &spots);
        debug!(
            location_id,
            available = availability.available,
            total = availability.total,
            "Lot loaded"
        );
        Ok(LotSnapshot {
            level: self.thresholds.classify(&availability),
            location,
            spots,
            availability,
        })
    }

    /// Current state of one spot. The way to resolve an indeterminate write.
    pub async fn get_spot(&self, location_id: i32, spot_number: u32) -> DomainResult<Spot> {
        let location = self.get_location(location_id).await?;
        let missing = || {
            DomainError::not_found(
                "Spot",
                "spot_number",
                format!("{} at location {}", spot_number, location_id),
            )
        };
        if !location.contains_spot(spot_number) {
            return Err(missing());
        }

        retry_with_backoff(
            self.retry.clone(),
            || self.repos.spots().find(location_id, spot_number),
            DomainError::is_transient,
            "get_spot",
        )
        .await?
        .ok_or_else(missing)
    }

    pub async fn availability(&self, location_id: i32) -> DomainResult<Availability> {
        let location = self.get_location(location_id).await?;
        let occupied = retry_with_backoff(
            self.retry.clone(),
            || self.repos.spots().count_occupied(location_id),
            DomainError::is_transient,
            "count_occupied",
        )
        .await?;
        Ok(Availability::from_occupied(&location, occupied))
    }
}
