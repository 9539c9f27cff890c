//! Startup provisioning of the location catalog

use tracing::info;

use crate::domain::{DomainResult, Location, RepositoryProvider};

/// What a provisioning pass changed
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProvisionReport {
    pub locations: usize,
    pub spots_created: u32,
}

/// Upsert every catalog entry and create its missing spots. Running it
/// again is harmless: existing spots keep their bookings.
pub async fn provision_catalog(
    repos: &dyn RepositoryProvider,
    catalog: &[Location],
) -> DomainResult<ProvisionReport> {
    let mut report = ProvisionReport::default();

    for location in catalog {
        location.validate()?;
        repos.locations().upsert(location.clone()).await?;
        let created = repos.spots().provision(location).await?;
        info!(
            location_id = location.id,
            name = %location.name,
            total_spots = location.total_spots,
            created,
            "Location provisioned"
        );
        report.locations += 1;
        report.spots_created += created;
    }

    Ok(report)
}
