//! Spot aggregate
//!
//! Contains the Spot entity, its per-viewer status, and the repository
//! interface with the conditional-update primitives.

pub mod model;
pub mod repository;

pub use model::{Spot, SpotState, SpotStatus};
pub use repository::SpotRepository;
