//! A viewer's session on one lot
//!
//! Holds the viewer's selected spot next to the last snapshot they saw.
//! Selection lives only here: it is cleared after a successful booking, and
//! after a successful cancellation of the selected spot. A failed action
//! leaves it in place so the viewer can retry.

use serde::Serialize;

use super::services::{LotService, LotSnapshot, ReservationService};
use crate::domain::{DomainError, DomainResult, GridPosition, Spot, SpotStatus};

/// One cell of the rendered grid
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpotView {
    pub spot_number: u32,
    pub position: GridPosition,
    pub status: SpotStatus,
}

pub struct LotView {
    viewer: String,
    location_id: i32,
    selected: Option<u32>,
    snapshot: Option<LotSnapshot>,
}

impl LotView {
    pub fn open(location_id: i32, viewer: impl Into<String>) -> Self {
        Self {
            viewer: viewer.into(),
            location_id,
            selected: None,
            snapshot: None,
        }
    }

    pub fn viewer(&self) -> &str {
        &self.viewer
    }

    pub fn location_id(&self) -> i32 {
        self.location_id
    }

    pub fn selected(&self) -> Option<u32> {
        self.selected
    }

    pub fn snapshot(&self) -> Option<&LotSnapshot> {
        self.snapshot.as_ref()
    }

    /// Re-read the lot. Called on open and on every live-update event.
    pub async fn refresh(&mut self, lots: &LotService) -> DomainResult<&LotSnapshot> {
        let snapshot = lots.get_lot(self.location_id).await?;
        Ok(self.snapshot.insert(snapshot))
    }

    /// Select a spot. Spots held by someone else are ignored and `false`
    /// is returned; the previous selection stays.
    pub fn select(&mut self, spot_number: u32) -> bool {
        let selectable = self
            .snapshot
            .as_ref()
            .and_then(|lot| lot.spot(spot_number))
            .map(|spot| spot.is_selectable_by(&self.viewer))
            .unwrap_or(false);
        if selectable {
            self.selected = Some(spot_number);
        }
        selectable
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    /// Book the selected spot
    pub async fn book_selected(
        &mut self,
        reservations: &ReservationService,
        lots: &LotService,
    ) -> DomainResult<Spot> {
        let spot_number = self.require_selection()?;
        let spot = reservations
            .book(self.location_id, spot_number, &self.viewer)
            .await?;
        self.selected = None;
        self.apply(spot.clone(), lots);
        Ok(spot)
    }

    /// Cancel the viewer's booking on the selected spot
    pub async fn cancel_selected(
        &mut self,
        reservations: &ReservationService,
        lots: &LotService,
    ) -> DomainResult<Spot> {
        let spot_number = self.require_selection()?;
        self.cancel(spot_number, reservations, lots).await
    }

    /// Cancel one of the viewer's bookings on this lot, selected or not.
    /// The selection only goes away when it was this spot.
    pub async fn cancel(
        &mut self,
        spot_number: u32,
        reservations: &ReservationService,
        lots: &LotService,
    ) -> DomainResult<Spot> {
        let spot = reservations
            .cancel(self.location_id, spot_number, &self.viewer)
            .await?;
        if self.selected == Some(spot_number) {
            self.selected = None;
        }
        self.apply(spot.clone(), lots);
        Ok(spot)
    }

    /// Grid cells with the viewer's status for each spot, in number order.
    pub fn spot_views(&self) -> Vec<SpotView> {
        let Some(lot) = &self.snapshot else {
            return Vec::new();
        };
        lot.spots
            .iter()
            .filter_map(|spot| {
                lot.location
                    .position_of(spot.spot_number)
                    .map(|position| SpotView {
                        spot_number: spot.spot_number,
                        position,
                        status: spot.status_for(&self.viewer, self.selected),
                    })
            })
            .collect()
    }

    /// Spots on this lot booked by the viewer, from the last snapshot
    pub fn my_spots(&self) -> Vec<u32> {
        self.snapshot
            .iter()
            .flat_map(|lot| lot.spots.iter())
            .filter(|s| s.is_owned_by(&self.viewer))
            .map(|s| s.spot_number)
            .collect()
    }

    fn require_selection(&self) -> DomainResult<u32> {
        self.selected
            .ok_or_else(|| DomainError::Validation("no spot selected".into()))
    }

    fn apply(&mut self, spot: Spot, lots: &LotService) {
        if let Some(lot) = self.snapshot.as_mut() {
            lot.apply(spot, lots.thresholds());
        }
    }
}
