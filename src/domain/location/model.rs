//! Location domain entity

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{DomainError, DomainResult};

/// Position of a spot inside a location's grid (both 0-indexed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridPosition {
    pub row: u32,
    pub column: u32,
}

/// A parking facility with a fixed, row-major grid of spots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: i32,
    pub name: String,
    pub address: String,
    pub total_spots: u32,
    pub price_per_hour: Decimal,
    pub rows: u32,
    pub spots_per_row: u32,
}

impl Location {
    /// Build a location, rejecting grids that do not add up to `total_spots`.
    pub fn new(
        id: i32,
        name: impl Into<String>,
        address: impl Into<String>,
        rows: u32,
        spots_per_row: u32,
        price_per_hour: Decimal,
    ) -> DomainResult<Self> {
        let location = Self {
            id,
            name: name.into(),
            address: address.into(),
            total_spots: rows.saturating_mul(spots_per_row),
            price_per_hour,
            rows,
            spots_per_row,
        };
        location.validate()?;
        Ok(location)
    }

    pub fn validate(&self) -> DomainResult<()> {
        if self.name.trim().is_empty() {
            return Err(DomainError::Validation(format!(
                "location {} has an empty name",
                self.id
            )));
        }
        if self.total_spots == 0 {
            return Err(DomainError::Validation(format!(
                "location {} must have at least one spot",
                self.id
            )));
        }
        if u64::from(self.rows) * u64::from(self.spots_per_row) != u64::from(self.total_spots) {
            return Err(DomainError::Validation(format!(
                "location {}: {} rows x {} spots per row != {} total spots",
                self.id, self.rows, self.spots_per_row, self.total_spots
            )));
        }
        if self.price_per_hour.is_sign_negative() && !self.price_per_hour.is_zero() {
            return Err(DomainError::Validation(format!(
                "location {} has a negative hourly price",
                self.id
            )));
        }
        Ok(())
    }

    pub fn contains_spot(&self, spot_number: u32) -> bool {
        (1..=self.total_spots).contains(&spot_number)
    }

    /// Row-major grid position of `spot_number`, or `None` if it is outside the lot.
    pub fn position_of(&self, spot_number: u32) -> Option<GridPosition> {
        if !self.contains_spot(spot_number) {
            return None;
        }
        let index = spot_number - 1;
        Some(GridPosition {
            row: index / self.spots_per_row,
            column: index % self.spots_per_row,
        })
    }

    /// Inverse of [`position_of`](Self::position_of).
    pub fn spot_number_at(&self, position: GridPosition) -> Option<u32> {
        if position.row >= self.rows || position.column >= self.spots_per_row {
            return None;
        }
        Some(position.row * self.spots_per_row + position.column + 1)
    }

    /// All spot numbers of the lot, ascending.
    pub fn spot_numbers(&self) -> impl Iterator<Item = u32> {
        1..=self.total_spots
    }
}
