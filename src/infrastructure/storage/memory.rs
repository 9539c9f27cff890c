//! In-memory storage implementation
//!
//! Backed by `DashMap`. Conditional writes take the shard write lock for the
//! spot's key via `get_mut`, so the check and the set happen atomically with
//! respect to every other writer of that spot.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::domain::location::{Location, LocationRepository};
use crate::domain::repositories::RepositoryProvider;
use crate::domain::spot::{Spot, SpotRepository};
use crate::domain::{DomainError, DomainResult};

/// In-memory location catalog
#[derive(Default)]
pub struct InMemoryLocationRepository {
    locations: DashMap<i32, Location>,
}

#[async_trait]
impl LocationRepository for InMemoryLocationRepository {
    async fn find_by_id(&self, id: i32) -> DomainResult<Option<Location>> {
        Ok(self.locations.get(&id).map(|l| l.clone()))
    }

    async fn find_all(&self) -> DomainResult<Vec<Location>> {
        let mut all: Vec<Location> = self.locations.iter().map(|e| e.value().clone()).collect();
        all.sort_by_key(|l| l.id);
        Ok(all)
    }

    async fn upsert(&self, location: Location) -> DomainResult<()> {
        location.validate()?;
        self.locations.insert(location.id, location);
        Ok(())
    }
}

/// In-memory spot store with optional fault injection for tests.
#[derive(Default)]
pub struct InMemorySpotRepository {
    spots: DashMap<(i32, u32), Spot>,
    write_latency_ms: AtomicU64,
    read_latency_ms: AtomicU64,
    pending_read_failures: AtomicU32,
}

impl InMemorySpotRepository {
    /// Delay every conditional write by `latency` *after* it has been applied,
    /// the way a slow acknowledgement from a remote store looks to a caller.
    pub fn set_write_latency(&self, latency: Duration) {
        self.write_latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Delay lot reads by `latency` after the snapshot has been taken, so a
    /// caller can act on data that is already stale.
    pub fn set_read_latency(&self, latency: Duration) {
        self.read_latency_ms
            .store(latency.as_millis() as u64, Ordering::SeqCst);
    }

    /// Make the next `count` reads fail with a transient error.
    pub fn fail_next_reads(&self, count: u32) {
        self.pending_read_failures.store(count, Ordering::SeqCst);
    }

    fn check_read(&self) -> DomainResult<()> {
        let took = self
            .pending_read_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        match took {
            Ok(_) => Err(DomainError::Transient("injected read failure".into())),
            Err(_) => Ok(()),
        }
    }

    async fn ack_delay(&self) {
        pause(&self.write_latency_ms).await;
    }

    async fn read_delay(&self) {
        pause(&self.read_latency_ms).await;
    }
}

async fn pause(latency_ms: &AtomicU64) {
    let ms = latency_ms.load(Ordering::SeqCst);
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

#[async_trait]
impl SpotRepository for InMemorySpotRepository {
    async fn find_by_location(&self, location_id: i32) -> DomainResult<Vec<Spot>> {
        self.check_read()?;
        let mut spots: Vec<Spot> = self
            .spots
            .iter()
            .filter(|e| e.key().0 == location_id)
            .map(|e| e.value().clone())
            .collect();
        spots.sort_by_key(|s| s.spot_number);
        self.read_delay().await;
        Ok(spots)
    }

    async fn find(&self, location_id: i32, spot_number: u32) -> DomainResult<Option<Spot>> {
        self.check_read()?;
        Ok(self
            .spots
            .get(&(location_id, spot_number))
            .map(|s| s.clone()))
    }

    async fn find_booked_by(&self, user_id: &str) -> DomainResult<Vec<Spot>> {
        self.check_read()?;
        let mut spots: Vec<Spot> = self
            .spots
            .iter()
            .filter(|e| e.value().is_owned_by(user_id))
            .map(|e| e.value().clone())
            .collect();
        spots.sort_by_key(|s| (s.location_id, s.spot_number));
        Ok(spots)
    }

    async fn count_occupied(&self, location_id: i32) -> DomainResult<u32> {
        self.check_read()?;
        let occupied = self
            .spots
            .iter()
            .filter(|e| e.key().0 == location_id && e.value().is_occupied)
            .count() as u32;
        self.read_delay().await;
        Ok(occupied)
    }

    async fn try_occupy(
        &self,
        location_id: i32,
        spot_number: u32,
        user_id: &str,
        at: DateTime<Utc>,
    ) -> DomainResult<bool> {
        let applied = match self.spots.get_mut(&(location_id, spot_number)) {
            Some(mut spot) if !spot.is_occupied => {
                spot.occupy(user_id, at);
                true
            }
            _ => false,
        };
        self.ack_delay().await;
        Ok(applied)
    }

    async fn try_release(
        &self,
        location_id: i32,
        spot_number: u32,
        user_id: &str,
    ) -> DomainResult<bool> {
        let applied = match self.spots.get_mut(&(location_id, spot_number)) {
            Some(mut spot) if spot.is_owned_by(user_id) => {
                spot.release();
                true
            }
            _ => false,
        };
        self.ack_delay().await;
        Ok(applied)
    }

    async fn provision(&self, location: &Location) -> DomainResult<u32> {
        let mut created = 0;
        for n in location.spot_numbers() {
            self.spots.entry((location.id, n)).or_insert_with(|| {
                created += 1;
                Spot::available(location.id, n)
            });
        }
        Ok(created)
    }
}

/// In-memory repository provider for development and testing
#[derive(Default)]
pub struct InMemoryRepositoryProvider {
    locations: InMemoryLocationRepository,
    spots: InMemorySpotRepository,
}

impl InMemoryRepositoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Direct handle for fault injection in tests.
    pub fn spot_store(&self) -> &InMemorySpotRepository {
        &self.spots
    }
}

impl RepositoryProvider for InMemoryRepositoryProvider {
    fn locations(&self) -> &dyn LocationRepository {
        &self.locations
    }

    fn spots(&self) -> &dyn SpotRepository {
        &self.spots
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rust_decimal::Decimal;

    use super::*;

    fn lot() -> Location {
        Location::new(1, "City Park", "789 Park Boulevard", 4, 10, Decimal::from(3)).unwrap()
    }

    async fn provisioned() -> InMemorySpotRepository {
        let repo = InMemorySpotRepository::default();
        assert_eq!(repo.provision(&lot()).await.unwrap(), 40);
        repo
    }

    #[tokio::test]
    async fn provision_is_idempotent_and_keeps_bookings() {
        let repo = provisioned().await;
        assert!(repo.try_occupy(1, 5, "alice", Utc::now()).await.unwrap());

        assert_eq!(repo.provision(&lot()).await.unwrap(), 0);
        let spot = repo.find(1, 5).await.unwrap().unwrap();
        assert!(spot.is_owned_by("alice"));
    }

    #[tokio::test]
    async fn spots_are_sorted_by_number() {
        let repo = provisioned().await;
        let numbers: Vec<u32> = repo
            .find_by_location(1)
            .await
            .unwrap()
            .iter()
            .map(|s| s.spot_number)
            .collect();
        assert_eq!(numbers, (1..=40).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn occupy_requires_free_spot() {
        let repo = provisioned().await;
        assert!(repo.try_occupy(1, 7, "alice", Utc::now()).await.unwrap());
        assert!(!repo.try_occupy(1, 7, "bob", Utc::now()).await.unwrap());
        assert!(!repo.try_occupy(1, 99, "bob", Utc::now()).await.unwrap());
        assert_eq!(repo.count_occupied(1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn release_requires_owner() {
        let repo = provisioned().await;
        repo.try_occupy(1, 7, "alice", Utc::now()).await.unwrap();

        assert!(!repo.try_release(1, 7, "bob").await.unwrap());
        assert!(repo.try_release(1, 7, "alice").await.unwrap());
        assert!(!repo.try_release(1, 7, "alice").await.unwrap());
    }

    #[tokio::test]
    async fn concurrent_occupy_has_single_winner() {
        let repo = Arc::new(provisioned().await);
        let mut handles = Vec::new();
        for i in 0..32 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                repo.try_occupy(1, 1, &format!("user-{i}"), Utc::now())
                    .await
                    .unwrap()
            }));
        }
        let mut winners = 0;
        for h in handles {
            if h.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn injected_read_failures_are_transient() {
        let repo = provisioned().await;
        repo.fail_next_reads(1);
        assert!(matches!(
            repo.find_by_location(1).await,
            Err(DomainError::Transient(_))
        ));
        assert!(repo.find_by_location(1).await.is_ok());
    }

    #[tokio::test]
    async fn booked_by_spans_locations() {
        let repo = provisioned().await;
        let other = Location::new(2, "Airport", "Terminal 1", 1, 5, Decimal::from(12)).unwrap();
        repo.provision(&other).await.unwrap();

        repo.try_occupy(2, 3, "alice", Utc::now()).await.unwrap();
        repo.try_occupy(1, 9, "alice", Utc::now()).await.unwrap();
        repo.try_occupy(1, 2, "bob", Utc::now()).await.unwrap();

        let mine: Vec<(i32, u32)> = repo
            .find_booked_by("alice")
            .await
            .unwrap()
            .iter()
            .map(|s| (s.location_id, s.spot_number))
            .collect();
        assert_eq!(mine, vec![(1, 9), (2, 3)]);
    }
}
