//! Application configuration
//!
//! Loaded from TOML. The default location is
//! `~/.config/parkeasy/config.toml`; `PARKEASY_CONFIG` points elsewhere.
//! A missing file means defaults.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{AvailabilityThresholds, Location};
use crate::infrastructure::database::DatabaseConfig;
use crate::shared::{InfraError, RetryConfig};

pub const CONFIG_ENV: &str = "PARKEASY_CONFIG";

/// `$PARKEASY_CONFIG`, else `~/.config/parkeasy/config.toml`
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }
    dirs_next::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("parkeasy")
        .join("config.toml")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseSettings,
    pub logging: LoggingConfig,
    pub security: SecurityConfig,
    pub reservations: ReservationConfig,
    pub live_updates: LiveUpdateConfig,
    pub availability: AvailabilityThresholds,
    pub retry: RetryConfig,
    pub catalog: Vec<CatalogEntry>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseSettings::default(),
            logging: LoggingConfig::default(),
            security: SecurityConfig::default(),
            reservations: ReservationConfig::default(),
            live_updates: LiveUpdateConfig::default(),
            availability: AvailabilityThresholds::default(),
            retry: RetryConfig::default(),
            catalog: default_catalog(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub api_host: String,
    /// 0 binds a free port
    pub api_port: u16,
    /// Seconds to wait for in-flight work on shutdown
    pub shutdown_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_host: "0.0.0.0".to_string(),
            api_port: 8080,
            shutdown_timeout: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Full connection URL; takes precedence over `sqlite_path`
    pub url: Option<String>,
    pub sqlite_path: String,
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: None,
            sqlite_path: "./parkeasy.db".to_string(),
            max_connections: 8,
        }
    }
}

impl DatabaseSettings {
    pub fn connection_url(&self) -> String {
        match &self.url {
            Some(url) if !url.trim().is_empty() => url.clone(),
            _ => format!("sqlite://{}?mode=rwc", self.sqlite_path),
        }
    }

    pub fn to_database_config(&self) -> DatabaseConfig {
        DatabaseConfig {
            url: self.connection_url(),
            max_connections: self.max_connections.max(1),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `RUST_LOG` syntax; the env var wins when set
    pub level: String,
    /// "text" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// HS256 secret shared with the identity provider
    pub jwt_secret: String,
    /// Expected `iss` claim; not checked when empty
    pub jwt_issuer: Option<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "change-me-in-production".to_string(),
            jwt_issuer: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReservationConfig {
    pub write_timeout_ms: u64,
}

impl Default for ReservationConfig {
    fn default() -> Self {
        Self {
            write_timeout_ms: 5_000,
        }
    }
}

impl ReservationConfig {
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveUpdateConfig {
    /// Buffered events per location before a slow subscriber must resync
    pub channel_capacity: usize,
}

impl Default for LiveUpdateConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
        }
    }
}

/// A location to provision at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: i32,
    pub name: String,
    pub address: String,
    pub rows: u32,
    pub spots_per_row: u32,
    pub price_per_hour: Decimal,
}

impl CatalogEntry {
    fn new(id: i32, name: &str, address: &str, rows: u32, spots_per_row: u32, price: i64) -> Self {
        Self {
            id,
            name: name.to_string(),
            address: address.to_string(),
            rows,
            spots_per_row,
            price_per_hour: Decimal::from(price),
        }
    }

    pub fn to_location(&self) -> Result<Location, InfraError> {
        Location::new(
            self.id,
            self.name.clone(),
            self.address.clone(),
            self.rows,
            self.spots_per_row,
            self.price_per_hour,
        )
        .map_err(|e| InfraError::Config(format!("catalog entry {}: {}", self.id, e)))
    }
}

fn default_catalog() -> Vec<CatalogEntry> {
    vec![
        CatalogEntry::new(1, "Downtown Mall", "123 Main Street, City Center", 5, 10, 5),
        CatalogEntry::new(2, "Business District", "456 Corporate Avenue", 3, 10, 8),
        CatalogEntry::new(3, "City Park", "789 Park Boulevard", 4, 10, 3),
        CatalogEntry::new(4, "Airport Terminal", "Airport Road, Terminal 1", 10, 10, 12),
    ]
}

impl AppConfig {
    /// Read `path`. A missing file yields the defaults; an empty catalog
    /// section yields the default catalog.
    pub fn load(path: &Path) -> Result<Self, InfraError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, InfraError> {
        let config: AppConfig = toml::from_str(raw)
            .map_err(|e| InfraError::Config(format!("invalid TOML: {}", e)))?;
        let config = config.with_default_catalog();
        config.validate()?;
        Ok(config)
    }

    /// Write as TOML, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), InfraError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = toml::to_string_pretty(self)
            .map_err(|e| InfraError::Config(format!("cannot serialize config: {}", e)))?;
        std::fs::write(path, raw)?;
        Ok(())
    }

    fn with_default_catalog(mut self) -> Self {
        if self.catalog.is_empty() {
            self.catalog = default_catalog();
        }
        self
    }

    pub fn validate(&self) -> Result<(), InfraError> {
        if self.security.jwt_secret.is_empty() {
            return Err(InfraError::Config("security.jwt_secret must be set".into()));
        }
        if self.live_updates.channel_capacity == 0 {
            return Err(InfraError::Config(
                "live_updates.channel_capacity must be positive".into(),
            ));
        }
        let mut ids = HashSet::new();
        for entry in &self.catalog {
            if !ids.insert(entry.id) {
                return Err(InfraError::Config(format!(
                    "catalog id {} appears twice",
                    entry.id
                )));
            }
            entry.to_location()?;
        }
        Ok(())
    }

    /// Catalog as validated locations
    pub fn locations(&self) -> Result<Vec<Location>, InfraError> {
        self.catalog.iter().map(CatalogEntry::to_location).collect()
    }
}
