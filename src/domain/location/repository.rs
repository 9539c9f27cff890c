//! Location repository interface

use async_trait::async_trait;

use super::model::Location;
use crate::domain::DomainResult;

/// Read access to the location catalog, plus the upsert used when the
/// catalog is provisioned at startup.
#[async_trait]
pub trait LocationRepository: Send + Sync {
    /// Find location by ID
    async fn find_by_id(&self, id: i32) -> DomainResult<Option<Location>>;

    /// All locations, ordered by ID
    async fn find_all(&self) -> DomainResult<Vec<Location>>;

    /// Insert or replace a catalog entry
    async fn upsert(&self, location: Location) -> DomainResult<()>;
}
