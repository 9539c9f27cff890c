//! Reservation server runtime.
//!
//! [`ServerHandle`] owns the full lifecycle: database init, migrations,
//! catalog provisioning, the live-update bus, the REST API and graceful
//! shutdown. The CLI binary is a thin wrapper around it.

use std::sync::{Arc, OnceLock};

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use sea_orm::DatabaseConnection;
use sea_orm_migration::MigratorTrait;
use tracing::{error, info, warn};

use crate::application::{
    create_event_bus, provision_catalog, LotService, ReservationService, SharedEventBus,
};
use crate::config::AppConfig;
use crate::domain::RepositoryProvider;
use crate::infrastructure::crypto::jwt::JwtConfig;
use crate::infrastructure::database::migrator::Migrator;
use crate::infrastructure::{init_database, SeaOrmRepositoryProvider};
use crate::interfaces::http::{create_api_router, ApiServices};
use crate::shared::{AppError, InfraError, ShutdownCoordinator, ShutdownSignal};

// ── Options ────────────────────────────────────────────────────────

/// Options for starting the reservation server.
pub struct ServerOptions {
    pub config: AppConfig,
    /// Run database migrations on startup (default: true).
    pub auto_migrate: bool,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            config: AppConfig::default(),
            auto_migrate: true,
        }
    }
}

// ── ServerHandle ───────────────────────────────────────────────────

/// Handle to a running reservation server.
///
/// ```rust,no_run
/// use parkeasy::server::{ServerHandle, ServerOptions};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let handle = ServerHandle::start(ServerOptions::default()).await?;
///     handle.shutdown().await;
///     Ok(())
/// }
/// ```
pub struct ServerHandle {
    /// Live-update bus shared with the WebSocket handlers.
    pub event_bus: SharedEventBus,
    pub repos: Arc<dyn RepositoryProvider>,
    pub reservations: Arc<ReservationService>,
    pub lots: Arc<LotService>,
    /// The configuration the server was started with.
    pub config: AppConfig,
    /// Port the API actually listens on (differs from the config when it asked for 0).
    pub api_port: u16,

    db: DatabaseConnection,
    shutdown: ShutdownCoordinator,
    api_task: tokio::task::JoinHandle<()>,
}

impl ServerHandle {
    /// Start the server.
    ///
    /// 1. Install the Prometheus recorder
    /// 2. Connect to the database and run migrations
    /// 3. Provision the configured catalog
    /// 4. Start the REST API with Swagger UI and live updates
    pub async fn start(opts: ServerOptions) -> Result<Self, AppError> {
        let app_cfg = opts.config;
        app_cfg.validate()?;

        info!("Starting ParkEasy reservation service...");

        let prometheus_handle = prometheus_handle()?;

        // ── Database ───────────────────────────────────────────
        let db_config = app_cfg.database.to_database_config();
        let db = init_database(&db_config).await?;

        if opts.auto_migrate {
            info!("Running database migrations...");
            Migrator::up(&db, None).await?;
            info!("Migrations completed");
        }

        let repos: Arc<dyn RepositoryProvider> =
            Arc::new(SeaOrmRepositoryProvider::new(db.clone()));

        // ── Catalog ────────────────────────────────────────────
        let catalog = app_cfg.locations()?;
        let report = provision_catalog(repos.as_ref(), &catalog).await?;
        info!(
            locations = report.locations,
            spots_created = report.spots_created,
            "Catalog provisioned"
        );

        // ── Services ───────────────────────────────────────────
        let event_bus = create_event_bus(app_cfg.live_updates.channel_capacity);
        let lots = Arc::new(
            LotService::new(repos.clone())
                .with_thresholds(app_cfg.availability.clone())
                .with_retry(app_cfg.retry.clone()),
        );
        let reservations = Arc::new(
            ReservationService::new(repos.clone(), event_bus.clone())
                .with_write_timeout(app_cfg.reservations.write_timeout()),
        );

        let jwt_config = JwtConfig {
            secret: app_cfg.security.jwt_secret.clone(),
            issuer: app_cfg.security.jwt_issuer.clone(),
        };
        if app_cfg.security.jwt_secret == crate::config::SecurityConfig::default().jwt_secret {
            warn!("security.jwt_secret is the built-in default; set a real secret");
        }

        // ── Shutdown coordinator ───────────────────────────────
        let shutdown = ShutdownCoordinator::new(app_cfg.server.shutdown_timeout);
        let shutdown_signal = shutdown.signal();

        // ── REST API server ────────────────────────────────────
        let api_router = create_api_router(ApiServices {
            repos: repos.clone(),
            lots: lots.clone(),
            reservations: reservations.clone(),
            event_bus: event_bus.clone(),
            jwt_config,
            prometheus: prometheus_handle,
        });

        let api_addr = format!("{}:{}", app_cfg.server.api_host, app_cfg.server.api_port);
        let listener = tokio::net::TcpListener::bind(&api_addr).await?;
        let api_port = listener.local_addr()?.port();
        info!("REST API server listening on http://{}", api_addr);
        info!("Swagger UI available at http://{}/docs/", api_addr);

        let api_shutdown = shutdown_signal.clone();
        let api_server = axum::serve(listener, api_router).with_graceful_shutdown(async move {
            api_shutdown.wait().await;
            info!("REST API server received shutdown signal");
        });

        let api_task = tokio::spawn(async move {
            if let Err(e) = api_server.await {
                error!("REST API server error: {}", e);
            }
        });

        info!("Server started");

        Ok(Self {
            event_bus,
            repos,
            reservations,
            lots,
            config: app_cfg,
            api_port,
            db,
            shutdown,
            api_task,
        })
    }

    /// Get a cloneable shutdown signal.
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.signal()
    }

    /// Install OS signal listeners (SIGTERM, SIGINT) that trigger shutdown.
    pub fn install_signal_handler(&self) {
        self.shutdown.start_signal_listener();
    }

    /// Trigger graceful shutdown (non-blocking). Call [`wait`](Self::wait)
    /// to block until everything has stopped.
    pub fn trigger_shutdown(&self) {
        self.shutdown.signal().trigger();
    }

    /// Wait for the server to fully stop after shutdown has been triggered.
    pub async fn wait(self) {
        info!("Waiting for server tasks to complete...");

        let Self {
            db,
            shutdown,
            api_task,
            ..
        } = self;

        let drained = shutdown
            .shutdown_with_cleanup(|| async move {
                match api_task.await {
                    Ok(()) => info!("REST API server stopped"),
                    Err(e) => error!("REST API server task panicked: {}", e),
                }
            })
            .await;
        if !drained {
            warn!("Open connections did not drain in time");
        }

        if let Err(e) = db.close().await {
            warn!("Error closing database connection: {}", e);
        } else {
            info!("Database connection closed");
        }

        info!("ParkEasy shutdown complete");
    }

    /// Trigger shutdown and wait for completion.
    pub async fn shutdown(self) {
        info!("Shutting down ParkEasy...");
        self.trigger_shutdown();
        self.wait().await;
    }

    pub fn is_running(&self) -> bool {
        !self.api_task.is_finished()
    }
}

// ── Helpers ────────────────────────────────────────────────────────

/// The global recorder can be installed once per process; later starts
/// (stop + start within one process, tests) reuse it.
fn prometheus_handle() -> Result<PrometheusHandle, InfraError> {
    static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

    if let Some(handle) = PROM_HANDLE.get() {
        return Ok(handle.clone());
    }
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| InfraError::Config(format!("cannot install metrics recorder: {}", e)))?;
    info!("Prometheus metrics recorder installed");
    Ok(PROM_HANDLE.get_or_init(|| handle).clone())
}

/// Initialize tracing from the application config. `RUST_LOG` wins over
/// `logging.level` when set.
///
/// Call once at process startup, before [`ServerHandle::start`].
pub fn init_tracing(config: &AppConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    match config.logging.format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseSettings;

    fn test_config() -> AppConfig {
        let mut config = AppConfig::from_toml("").unwrap();
        config.server.api_host = "127.0.0.1".into();
        config.server.shutdown_timeout = 5;
        config.database = DatabaseSettings {
            url: Some("sqlite::memory:".into()),
            ..DatabaseSettings::default()
        };
        config
    }

    #[tokio::test]
    async fn test_start_provisions_catalog_and_stops() {
        let mut config = test_config();
        config.server.api_port = 0;

        let handle = ServerHandle::start(ServerOptions {
            config,
            auto_migrate: true,
        })
        .await
        .unwrap();
        assert!(handle.is_running());
        assert_ne!(handle.api_port, 0);

        let listing = handle.lots.list_locations_with_availability().await.unwrap();
        let totals: Vec<u32> = listing.iter().map(|o| o.availability.total).collect();
        assert_eq!(totals, vec![50, 30, 40, 100]);

        handle.reservations.book(4, 100, "alice").await.unwrap();
        let spot = handle.lots.get_spot(4, 100).await.unwrap();
        assert!(spot.is_owned_by("alice"));

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_invalid_config_refuses_to_start() {
        let mut config = test_config();
        config.security.jwt_secret.clear();
        assert!(ServerHandle::start(ServerOptions {
            config,
            auto_migrate: true,
        })
        .await
        .is_err());
    }
}
