//! Application services

mod catalog;
mod lot;
mod reservation;

#[cfg(test)]
pub(crate) mod fixtures;

pub use catalog::{provision_catalog, ProvisionReport};
pub use lot::{LocationOverview, LotService, LotSnapshot};
pub use reservation::{ReservationService, DEFAULT_WRITE_TIMEOUT};
