pub mod events;
pub mod services;
pub mod viewer;

// Re-export key types for convenience
pub use events::{create_event_bus, EventBus, EventSubscriber, SharedEventBus, SubscriptionHandle};
pub use services::{
    provision_catalog, LocationOverview, LotService, LotSnapshot, ProvisionReport,
    ReservationService,
};
pub use viewer::{LotView, SpotView};
