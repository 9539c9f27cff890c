//! SeaORM implementation of RepositoryProvider

use sea_orm::DatabaseConnection;

use crate::domain::location::LocationRepository;
use crate::domain::repositories::RepositoryProvider;
use crate::domain::spot::SpotRepository;

use super::location_repository::SeaOrmLocationRepository;
use super::spot_repository::SeaOrmSpotRepository;

/// Unified repository provider backed by SeaORM.
///
/// Holds one connection pool and exposes per-aggregate repository accessors.
///
/// ```ignore
/// let repos = SeaOrmRepositoryProvider::new(db.clone());
/// let lot = repos.locations().find_by_id(1).await?;
/// let won = repos.spots().try_occupy(1, 12, "alice", Utc::now()).await?;
/// ```
pub struct SeaOrmRepositoryProvider {
    locations: SeaOrmLocationRepository,
    spots: SeaOrmSpotRepository,
}

impl SeaOrmRepositoryProvider {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            locations: SeaOrmLocationRepository::new(db.clone()),
            spots: SeaOrmSpotRepository::new(db),
        }
    }
}

impl RepositoryProvider for SeaOrmRepositoryProvider {
    fn locations(&self) -> &dyn LocationRepository {
        &self.locations
    }

    fn spots(&self) -> &dyn SpotRepository {
        &self.spots
    }
}
