//! Location and spot DTOs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::application::{LocationOverview, LotSnapshot};
use crate::domain::{Availability, AvailabilityLevel, Location, Spot, SpotStatus};

/// Parking location with live availability
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LocationDto {
    pub id: i32,
    pub name: String,
    pub address: String,
    pub total_spots: u32,
    /// Decimal string, e.g. "5"
    pub price_per_hour: Decimal,
    pub rows: u32,
    pub spots_per_row: u32,
    pub availability: Availability,
    pub level: AvailabilityLevel,
    /// False when the lot is full
    pub bookable: bool,
}

impl LocationDto {
    pub fn new(location: &Location, availability: Availability, level: AvailabilityLevel) -> Self {
        Self {
            id: location.id,
            name: location.name.clone(),
            address: location.address.clone(),
            total_spots: location.total_spots,
            price_per_hour: location.price_per_hour,
            rows: location.rows,
            spots_per_row: location.spots_per_row,
            availability,
            level,
            bookable: !availability.is_full(),
        }
    }
}

impl From<&LocationOverview> for LocationDto {
    fn from(o: &LocationOverview) -> Self {
        Self::new(&o.location, o.availability, o.level)
    }
}

/// One spot as the caller sees it. Other users' identities are never
/// exposed; only whether the spot is the caller's own.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SpotDto {
    pub location_id: i32,
    pub spot_number: u32,
    /// 0-indexed grid row
    pub row: u32,
    /// 0-indexed grid column
    pub column: u32,
    pub status: SpotStatus,
    pub is_occupied: bool,
    pub booked_by_me: bool,
    /// Only present on the caller's own booking
    pub booking_start: Option<DateTime<Utc>>,
}

impl SpotDto {
    pub fn new(location: &Location, spot: &Spot, viewer: &str, selected: Option<u32>) -> Self {
        let position = location.position_of(spot.spot_number);
        let mine = spot.is_owned_by(viewer);
        Self {
            location_id: spot.location_id,
            spot_number: spot.spot_number,
            row: position.map(|p| p.row).unwrap_or_default(),
            column: position.map(|p| p.column).unwrap_or_default(),
            status: spot.status_for(viewer, selected),
            is_occupied: spot.is_occupied,
            booked_by_me: mine,
            booking_start: if mine { spot.booking_start } else { None },
        }
    }
}

/// Full lot: location, availability and every spot in number order
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LotDto {
    pub location: LocationDto,
    pub spots: Vec<SpotDto>,
    pub selected: Option<u32>,
}

impl LotDto {
    /// A `selected` spot that is missing or held by someone else is dropped.
    pub fn new(lot: &LotSnapshot, viewer: &str, selected: Option<u32>) -> Self {
        let selected = selected.filter(|n| {
            lot.spot(*n)
                .map(|spot| spot.is_selectable_by(viewer))
                .unwrap_or(false)
        });
        Self {
            location: LocationDto::new(&lot.location, lot.availability, lot.level),
            spots: lot
                .spots
                .iter()
                .map(|s| SpotDto::new(&lot.location, s, viewer, selected))
                .collect(),
            selected,
        }
    }
}

/// Lot query parameters
#[derive(Debug, Default, Deserialize, Validate, IntoParams)]
pub struct LotQuery {
    /// Spot the viewer has selected; rendered as `selected` when free
    #[validate(range(min = 1))]
    pub selected: Option<u32>,
}
