//! Shared fixtures for service and interface tests

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use rust_decimal::Decimal;
use sea_orm::Database;
use sea_orm_migration::MigratorTrait;

use super::catalog::provision_catalog;
use crate::domain::{Event, EventPublisher, Location, RepositoryProvider};
use crate::infrastructure::database::migrator::Migrator;
use crate::infrastructure::database::{init_database, DatabaseConfig, SeaOrmRepositoryProvider};
use crate::infrastructure::storage::InMemoryRepositoryProvider;

pub fn downtown() -> Location {
    Location::new(1, "Downtown Mall", "123 Main Street, City Center", 5, 10, Decimal::from(5))
        .unwrap()
}

pub fn business_district() -> Location {
    Location::new(2, "Business District", "456 Corporate Avenue", 3, 10, Decimal::from(8))
        .unwrap()
}

pub fn catalog() -> Vec<Location> {
    vec![downtown(), business_district()]
}

pub async fn seeded_memory() -> Arc<InMemoryRepositoryProvider> {
    let repos = Arc::new(InMemoryRepositoryProvider::new());
    provision_catalog(repos.as_ref(), &catalog()).await.unwrap();
    repos
}

pub async fn memory_store() -> Arc<dyn RepositoryProvider> {
    seeded_memory().await
}

pub async fn sqlite_store() -> Arc<dyn RepositoryProvider> {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    let repos = Arc::new(SeaOrmRepositoryProvider::new(db));
    provision_catalog(repos.as_ref(), &catalog()).await.unwrap();
    repos
}

/// SQLite file in a fresh temp dir behind a pool of `max_connections`.
/// Returns the dir so the caller can remove it.
pub async fn sqlite_file_store(max_connections: u32) -> (Arc<dyn RepositoryProvider>, PathBuf) {
    let dir = std::env::temp_dir().join(format!("parkeasy-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    let config = DatabaseConfig {
        max_connections,
        ..DatabaseConfig::sqlite(&dir.join("parkeasy.db").display().to_string())
    };
    let db = init_database(&config).await.unwrap();
    Migrator::up(&db, None).await.unwrap();
    let repos = Arc::new(SeaOrmRepositoryProvider::new(db));
    provision_catalog(repos.as_ref(), &catalog()).await.unwrap();
    (repos, dir)
}

/// Both store implementations, seeded with the same catalog
pub async fn all_stores() -> Vec<(&'static str, Arc<dyn RepositoryProvider>)> {
    vec![("memory", memory_store().await), ("sqlite", sqlite_store().await)]
}

/// Publisher that keeps everything it is given
#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<Event>>,
}

impl RecordingPublisher {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }
}

impl EventPublisher for RecordingPublisher {
    fn publish(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}
