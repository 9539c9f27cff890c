use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::Spot;

/// One of the caller's bookings
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BookingDto {
    pub location_id: i32,
    pub spot_number: u32,
    pub booking_start: Option<DateTime<Utc>>,
}

impl From<&Spot> for BookingDto {
    fn from(spot: &Spot) -> Self {
        Self {
            location_id: spot.location_id,
            spot_number: spot.spot_number,
            booking_start: spot.booking_start,
        }
    }
}
