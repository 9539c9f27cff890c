//! # ParkEasy
//!
//! Parking-spot reservation service: browse locations, see live lot
//! availability and book or cancel individual spots without double booking.
//!
//! ## Architecture
//!
//! - **domain**: locations, spots, availability, events and the store ports
//! - **application**: reservation and lot services, the live-update bus, viewer sessions
//! - **infrastructure**: SeaORM and in-memory stores, token verification
//! - **interfaces**: REST API with Swagger documentation and the live WebSocket
//! - **server**: process lifecycle used by the CLI

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interfaces;
pub mod server;
pub mod shared;

pub use config::{default_config_path, AppConfig};

pub use infrastructure::{init_database, DatabaseConfig, InMemoryRepositoryProvider, SeaOrmRepositoryProvider};

pub use interfaces::http::{create_api_router, ApiServices};

pub use application::{create_event_bus, EventBus, LotService, ReservationService, SharedEventBus};

pub use server::{init_tracing, ServerHandle, ServerOptions};
