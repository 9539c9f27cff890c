//! Domain layer: parking locations, spots, availability and change events.

pub mod availability;
pub mod events;
pub mod location;
pub mod repositories;
pub mod spot;

pub use availability::{compute_availability, Availability, AvailabilityLevel, AvailabilityThresholds};
pub use events::{Event, EventMessage, EventPublisher, NoopPublisher};
pub use location::{GridPosition, Location, LocationRepository};
pub use repositories::RepositoryProvider;
pub use spot::{Spot, SpotRepository, SpotState, SpotStatus};

pub use crate::shared::errors::{DomainError, DomainResult};
