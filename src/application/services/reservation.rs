//! Booking and cancellation of spots
//!
//! Each mutation is one conditional write against the spot store. The
//! store decides the winner of a race; this service only turns a lost
//! precondition into the right error and publishes committed changes.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{info, warn};

use crate::domain::events::{ResyncRequiredEvent, SpotBookedEvent, SpotReleasedEvent};
use crate::domain::{
    DomainError, DomainResult, Event, EventPublisher, Location, RepositoryProvider, Spot,
};

pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

fn record_outcome(counter: &'static str, result: &DomainResult<Spot>, started: Instant) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(e) => e.kind(),
    };
    metrics::counter!(counter, "outcome" => outcome).increment(1);
    metrics::histogram!("parking_write_duration_seconds", "operation" => counter)
        .record(started.elapsed().as_secs_f64());
}

/// Service for booking and cancelling spots
pub struct ReservationService {
    repos: Arc<dyn RepositoryProvider>,
    events: Arc<dyn EventPublisher>,
    write_timeout: Duration,
}

impl ReservationService {
    pub fn new(repos: Arc<dyn RepositoryProvider>, events: Arc<dyn EventPublisher>) -> Self {
        Self {
            repos,
            events,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }

    /// Bound on how long a conditional write may take before its outcome
    /// is reported as unknown.
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Book an available spot for `user_id`.
    ///
    /// Of several concurrent callers on the same spot exactly one gets the
    /// committed spot back; the others get `Conflict`.
    pub async fn book(
        &self,
        location_id: i32,
        spot_number: u32,
        user_id: &str,
    ) -> DomainResult<Spot> {
        let started = Instant::now();
        let result = self.try_book(location_id, spot_number, user_id).await;
        record_outcome("parking_bookings_total", &result, started);
        result
    }

    /// Cancel the caller's own booking. Any other caller gets `Forbidden`
    /// and nothing changes.
    pub async fn cancel(
        &self,
        location_id: i32,
        spot_number: u32,
        user_id: &str,
    ) -> DomainResult<Spot> {
        let started = Instant::now();
        let result = self.try_cancel(location_id, spot_number, user_id).await;
        record_outcome("parking_cancellations_total", &result, started);
        result
    }

    /// Every spot currently booked by `user_id`, across all locations
    pub async fn bookings_for(&self, user_id: &str) -> DomainResult<Vec<Spot>> {
        require_user(user_id)?;
        self.repos.spots().find_booked_by(user_id).await
    }

    async fn try_book(
        &self,
        location_id: i32,
        spot_number: u32,
        user_id: &str,
    ) -> DomainResult<Spot> {
        require_user(user_id)?;
        self.require_spot(location_id, spot_number).await?;

        let at = Utc::now();
        let won = self
            .bounded("booking", location_id, spot_number, async {
                self.repos
                    .spots()
                    .try_occupy(location_id, spot_number, user_id, at)
                    .await
            })
            .await?;

        if !won {
            return Err(self.explain_lost_booking(location_id, spot_number, user_id).await);
        }

        let mut spot = Spot::available(location_id, spot_number);
        spot.occupy(user_id, at);

        info!(location_id, spot_number, user_id, "Spot booked");
        self.events.publish(Event::SpotBooked(SpotBookedEvent {
            location_id,
            spot_number,
            booked_by: user_id.to_string(),
            booking_start: at,
        }));

        Ok(spot)
    }

    async fn try_cancel(
        &self,
        location_id: i32,
        spot_number: u32,
        user_id: &str,
    ) -> DomainResult<Spot> {
        require_user(user_id)?;
        self.require_spot(location_id, spot_number).await?;

        let released = self
            .bounded("cancellation", location_id, spot_number, async {
                self.repos
                    .spots()
                    .try_release(location_id, spot_number, user_id)
                    .await
            })
            .await?;

        if !released {
            return Err(self.explain_refused_cancel(location_id, spot_number).await);
        }

        info!(location_id, spot_number, user_id, "Booking cancelled");
        self.events.publish(Event::SpotReleased(SpotReleasedEvent {
            location_id,
            spot_number,
            released_by: user_id.to_string(),
            timestamp: Utc::now(),
        }));

        Ok(Spot::available(location_id, spot_number))
    }

    async fn require_spot(&self, location_id: i32, spot_number: u32) -> DomainResult<Location> {
        let location = self
            .repos
            .locations()
            .find_by_id(location_id)
            .await?
            .ok_or_else(|| DomainError::not_found("Location", "id", location_id))?;

        if !location.contains_spot(spot_number) {
            return Err(DomainError::not_found(
                "Spot",
                "spot_number",
                format!("{} at location {}", spot_number, location_id),
            ));
        }
        Ok(location)
    }

    async fn bounded<T, F>(
        &self,
        action: &str,
        location_id: i32,
        spot_number: u32,
        write: F,
    ) -> DomainResult<T>
    where
        F: Future<Output = DomainResult<T>>,
    {
        match tokio::time::timeout(self.write_timeout, write).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    location_id,
                    spot_number,
                    timeout_ms = self.write_timeout.as_millis() as u64,
                    "{} timed out, outcome unknown",
                    action
                );
                // The write may still commit; viewers re-read the lot.
                self.events.publish(Event::ResyncRequired(ResyncRequiredEvent {
                    location_id,
                    missed: 0,
                }));
                Err(DomainError::Indeterminate(format!(
                    "{} of spot {} at location {}",
                    action, spot_number, location_id
                )))
            }
        }
    }

    /// The conditional write did not apply. Read the spot once to tell the
    /// caller why; the read never feeds back into a write.
    async fn explain_lost_booking(
        &self,
        location_id: i32,
        spot_number: u32,
        user_id: &str,
    ) -> DomainError {
        match self.repos.spots().find(location_id, spot_number).await {
            Ok(None) => DomainError::not_found(
                "Spot",
                "spot_number",
                format!("{} at location {}", spot_number, location_id),
            ),
            Ok(Some(spot)) if spot.is_owned_by(user_id) => DomainError::Conflict(format!(
                "spot {} is already booked by you",
                spot_number
            )),
            Ok(Some(_)) | Err(_) => DomainError::Conflict(format!(
                "spot {} was just booked by someone else; refresh the lot and pick another spot",
                spot_number
            )),
        }
    }

    async fn explain_refused_cancel(&self, location_id: i32, spot_number: u32) -> DomainError {
        match self.repos.spots().find(location_id, spot_number).await {
            Ok(None) => DomainError::not_found(
                "Spot",
                "spot_number",
                format!("{} at location {}", spot_number, location_id),
            ),
            Ok(Some(spot)) if !spot.is_occupied => {
                DomainError::Forbidden(format!("spot {} has no booking to cancel", spot_number))
            }
            Ok(Some(_)) | Err(_) => DomainError::Forbidden(format!(
                "spot {} is not booked by you",
                spot_number
            )),
        }
    }
}

fn require_user(user_id: &str) -> DomainResult<()> {
    if user_id.trim().is_empty() {
        return Err(DomainError::Unauthorized("missing user identity".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::fixtures::{
        all_stores, seeded_memory, sqlite_file_store, RecordingPublisher,
    };
    use crate::domain::{compute_availability, NoopPublisher};

    fn service(repos: Arc<dyn RepositoryProvider>) -> ReservationService {
        ReservationService::new(repos, Arc::new(NoopPublisher))
    }

    async fn assert_consistent(repos: &Arc<dyn RepositoryProvider>, location_id: i32) {
        for spot in repos.spots().find_by_location(location_id).await.unwrap() {
            assert!(spot.is_consistent(), "inconsistent spot {:?}", spot);
        }
    }

    #[tokio::test]
    async fn test_book_then_cancel_round_trip() {
        for (store, repos) in all_stores().await {
            let svc = service(repos.clone());

            let booked = svc.book(1, 12, "alice").await.unwrap();
            assert!(booked.is_occupied, "{}", store);
            assert_eq!(booked.booked_by.as_deref(), Some("alice"));
            assert!(booked.booking_start.is_some());
            assert_consistent(&repos, 1).await;

            let released = svc.cancel(1, 12, "alice").await.unwrap();
            assert!(!released.is_occupied);

            let stored = repos.spots().find(1, 12).await.unwrap().unwrap();
            assert!(!stored.is_occupied, "{}", store);
            assert!(stored.booked_by.is_none());
            assert!(stored.booking_start.is_none());
            assert_consistent(&repos, 1).await;
        }
    }

    #[tokio::test]
    async fn test_concurrent_bookings_have_one_winner() {
        for (store, repos) in all_stores().await {
            let svc = Arc::new(service(repos.clone()));

            let a = {
                let svc = svc.clone();
                tokio::spawn(async move { svc.book(1, 20, "alice").await })
            };
            let b = {
                let svc = svc.clone();
                tokio::spawn(async move { svc.book(1, 20, "bob").await })
            };
            let results = [a.await.unwrap(), b.await.unwrap()];

            let winners = results.iter().filter(|r| r.is_ok()).count();
            assert_eq!(winners, 1, "{}", store);
            let loser = results.iter().find_map(|r| r.as_ref().err()).unwrap();
            assert!(matches!(loser, DomainError::Conflict(_)), "{}: {:?}", store, loser);

            let stored = repos.spots().find(1, 20).await.unwrap().unwrap();
            let owner = stored.booked_by.clone().unwrap();
            assert!(owner == "alice" || owner == "bob");
            assert_consistent(&repos, 1).await;
        }
    }

    #[tokio::test]
    async fn test_many_racers_single_owner() {
        let repos: Arc<dyn RepositoryProvider> = seeded_memory().await;
        let svc = Arc::new(service(repos.clone()));

        let mut handles = Vec::new();
        for i in 0..24 {
            let svc = svc.clone();
            handles.push(tokio::spawn(async move {
                svc.book(2, 30, &format!("user-{}", i)).await
            }));
        }

        let mut ok = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => ok += 1,
                Err(DomainError::Conflict(_)) => {}
                Err(other) => panic!("unexpected error {:?}", other),
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(repos.spots().count_occupied(2).await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_pooled_sqlite_file_race_has_one_winner() {
        let (repos, dir) = sqlite_file_store(8).await;
        let svc = Arc::new(service(repos.clone()));

        let mut handles = Vec::new();
        for i in 0..16 {
            let svc = svc.clone();
            handles.push(tokio::spawn(async move {
                let user = format!("user-{}", i);
                (user.clone(), svc.book(1, 7, &user).await)
            }));
        }

        let mut winners = Vec::new();
        for handle in handles {
            match handle.await.unwrap() {
                (user, Ok(_)) => winners.push(user),
                (_, Err(DomainError::Conflict(_))) => {}
                (_, Err(other)) => panic!("unexpected error {:?}", other),
            }
        }
        assert_eq!(winners.len(), 1);

        let stored = repos.spots().find(1, 7).await.unwrap().unwrap();
        assert_eq!(stored.booked_by.as_deref(), Some(winners[0].as_str()));
        assert_eq!(repos.spots().count_occupied(1).await.unwrap(), 1);

        let _ = std::fs::remove_dir_all(dir);
    }

    #[tokio::test]
    async fn test_cancel_by_non_owner_is_forbidden() {
        for (store, repos) in all_stores().await {
            let svc = service(repos.clone());
            svc.book(1, 7, "alice").await.unwrap();
            let before = repos.spots().find(1, 7).await.unwrap();

            let err = svc.cancel(1, 7, "bob").await.unwrap_err();
            assert!(matches!(err, DomainError::Forbidden(_)), "{}: {:?}", store, err);
            assert_eq!(repos.spots().find(1, 7).await.unwrap(), before);
        }
    }

    #[tokio::test]
    async fn test_cancel_of_free_spot_is_forbidden() {
        for (_, repos) in all_stores().await {
            let err = service(repos).cancel(1, 9, "alice").await.unwrap_err();
            assert!(matches!(err, DomainError::Forbidden(_)));
        }
    }

    #[tokio::test]
    async fn test_rebooking_own_spot_conflicts() {
        let svc = service(seeded_memory().await);
        svc.book(1, 3, "alice").await.unwrap();
        match svc.book(1, 3, "alice").await {
            Err(DomainError::Conflict(msg)) => assert!(msg.contains("by you")),
            other => panic!("expected conflict, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_location_or_spot_is_not_found() {
        for (_, repos) in all_stores().await {
            let svc = service(repos);
            assert!(matches!(
                svc.book(99, 1, "alice").await,
                Err(DomainError::NotFound { entity: "Location", .. })
            ));
            assert!(matches!(
                svc.book(1, 51, "alice").await,
                Err(DomainError::NotFound { entity: "Spot", .. })
            ));
            assert!(matches!(
                svc.cancel(1, 0, "alice").await,
                Err(DomainError::NotFound { entity: "Spot", .. })
            ));
        }
    }

    #[tokio::test]
    async fn test_blank_user_is_unauthorized() {
        let svc = service(seeded_memory().await);
        assert!(matches!(
            svc.book(1, 1, "  ").await,
            Err(DomainError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_three_bookings_leave_47_available() {
        for (store, repos) in all_stores().await {
            let svc = service(repos.clone());
            for n in [4, 17, 33] {
                svc.book(1, n, "alice").await.unwrap();
            }

            let location = repos.locations().find_by_id(1).await.unwrap().unwrap();
            let spots = repos.spots().find_by_location(1).await.unwrap();
            let availability = compute_availability(&location, &spots);
            assert_eq!(availability.available, 47, "{}", store);
            assert_eq!(availability.total, 50);
        }
    }

    #[tokio::test]
    async fn test_bookings_for_spans_locations() {
        for (_, repos) in all_stores().await {
            let svc = service(repos);
            svc.book(2, 1, "alice").await.unwrap();
            svc.book(1, 40, "alice").await.unwrap();
            svc.book(1, 41, "bob").await.unwrap();

            let mine: Vec<(i32, u32)> = svc
                .bookings_for("alice")
                .await
                .unwrap()
                .iter()
                .map(|s| (s.location_id, s.spot_number))
                .collect();
            assert_eq!(mine, vec![(1, 40), (2, 1)]);
        }
    }

    #[tokio::test]
    async fn test_committed_changes_are_published() {
        let repos = seeded_memory().await;
        let recorder = Arc::new(RecordingPublisher::default());
        let svc = ReservationService::new(repos, recorder.clone());

        svc.book(1, 5, "alice").await.unwrap();
        let _ = svc.book(1, 5, "bob").await;
        let _ = svc.cancel(1, 5, "bob").await;
        svc.cancel(1, 5, "alice").await.unwrap();

        let kinds: Vec<&str> = recorder.events().iter().map(|e| e.event_type()).collect();
        assert_eq!(kinds, vec!["spot_booked", "spot_released"]);
    }

    #[tokio::test]
    async fn test_slow_write_is_indeterminate_but_may_have_committed() {
        let repos = seeded_memory().await;
        repos.spot_store().set_write_latency(Duration::from_millis(200));
        let recorder = Arc::new(RecordingPublisher::default());
        let svc = ReservationService::new(repos.clone(), recorder.clone())
            .with_write_timeout(Duration::from_millis(20));

        let err = svc.book(1, 8, "alice").await.unwrap_err();
        assert!(matches!(err, DomainError::Indeterminate(_)));
        assert_eq!(
            recorder.events(),
            vec![Event::ResyncRequired(ResyncRequiredEvent {
                location_id: 1,
                missed: 0
            })]
        );

        // Re-reading shows what actually happened.
        let spot = repos.spots().find(1, 8).await.unwrap().unwrap();
        assert_eq!(spot.booked_by.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn test_timed_out_write_tells_live_viewers_to_resync() {
        let repos = seeded_memory().await;
        repos.spot_store().set_write_latency(Duration::from_millis(200));
        let bus = crate::application::create_event_bus(8);
        let mut viewer = bus.subscribe(1);
        let mut elsewhere = bus.subscribe(2);
        let svc = ReservationService::new(repos.clone(), bus.clone())
            .with_write_timeout(Duration::from_millis(20));

        let err = svc.book(1, 9, "alice").await.unwrap_err();
        assert!(matches!(err, DomainError::Indeterminate(_)));

        let first = tokio::time::timeout(Duration::from_secs(1), viewer.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.event.event_type(), "resync_required");
        assert_eq!(first.event.location_id(), 1);
        assert!(
            tokio::time::timeout(Duration::from_millis(50), elsewhere.recv())
                .await
                .is_err()
        );

        let spot = repos.spots().find(1, 9).await.unwrap().unwrap();
        assert!(spot.is_owned_by("alice"));
    }

    #[tokio::test]
    async fn test_transient_read_surfaces() {
        let repos = seeded_memory().await;
        let svc = service(repos.clone());
        svc.book(1, 2, "alice").await.unwrap();

        repos.spot_store().fail_next_reads(1);
        assert!(matches!(
            svc.bookings_for("alice").await,
            Err(DomainError::Transient(_))
        ));
        assert_eq!(svc.bookings_for("alice").await.unwrap().len(), 1);
    }
}
