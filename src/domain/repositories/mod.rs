//! Repository traits for the domain layer
//!
//! `RepositoryProvider` gives unified access to the per-aggregate
//! repositories. Consumers request only the repository they need:
//!
//! ```ignore
//! async fn handle(repos: &dyn RepositoryProvider) {
//!     let lot = repos.locations().find_by_id(1).await?;
//!     let spots = repos.spots().find_by_location(1).await?;
//! }
//! ```

use super::location::LocationRepository;
use super::spot::SpotRepository;

pub use crate::shared::errors::DomainResult;

pub trait RepositoryProvider: Send + Sync {
    fn locations(&self) -> &dyn LocationRepository;
    fn spots(&self) -> &dyn SpotRepository;
}
