//! Database repository implementations
//!
//! Per-aggregate SeaORM repositories + unified RepositoryProvider.

pub mod location_repository;
pub mod repository_provider;
pub mod spot_repository;

pub use location_repository::SeaOrmLocationRepository;
pub use repository_provider::SeaOrmRepositoryProvider;
pub use spot_repository::SeaOrmSpotRepository;
