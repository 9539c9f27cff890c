//! Location aggregate
//!
//! Parking facilities and their spot grid geometry.

pub mod model;
pub mod repository;

pub use model::{GridPosition, Location};
pub use repository::LocationRepository;
