//! ParkEasy CLI server
//!
//! Headless reservation service suitable for a systemd unit, a container
//! or a plain process.
//!
//! ```sh
//! # Run with the default config (~/.config/parkeasy/config.toml)
//! parkeasy
//!
//! # Custom config path
//! parkeasy --config /etc/parkeasy/config.toml
//!
//! # Write the default config and exit
//! parkeasy --init-config
//!
//! # Validate config without starting
//! parkeasy --check
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};

use parkeasy::config::AppConfig;
use parkeasy::server::{init_tracing, ServerHandle, ServerOptions};

/// ParkEasy: parking-spot reservations with live availability.
#[derive(Parser, Debug)]
#[command(
    name = "parkeasy",
    version,
    about = "Parking-spot reservation service",
    long_about = "ParkEasy REST API and live-update server.\n\n\
                  Default config: ~/.config/parkeasy/config.toml"
)]
struct Cli {
    /// Path to the configuration file (TOML).
    #[arg(short, long, env = "PARKEASY_CONFIG")]
    config: Option<PathBuf>,

    /// Override the REST API listen port.
    #[arg(long)]
    api_port: Option<u16>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(short, long)]
    log_level: Option<String>,

    /// Validate the configuration file and exit without starting the server.
    #[arg(long)]
    check: bool,

    /// Write the default configuration to the config path and exit.
    #[arg(long)]
    init_config: bool,

    /// Skip database migrations on startup.
    #[arg(long)]
    no_migrate: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config_path = cli.config.unwrap_or_else(parkeasy::default_config_path);

    if cli.init_config {
        if config_path.exists() {
            eprintln!("Refusing to overwrite {}", config_path.display());
            std::process::exit(1);
        }
        AppConfig::load(&config_path)?.save(&config_path)?;
        println!("Default configuration written to {}", config_path.display());
        return Ok(());
    }

    // A broken config file is fatal.
    let mut config = match AppConfig::load(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::new("info"))
                .init();
            error!("Failed to load config from {}: {}", config_path.display(), e);
            std::process::exit(2);
        }
    };

    if let Some(port) = cli.api_port {
        config.server.api_port = port;
    }
    if let Some(ref level) = cli.log_level {
        config.logging.level = level.clone();
    }

    if cli.check {
        config.validate()?;
        println!("Configuration is valid");
        println!("   Config file : {}", config_path.display());
        println!("   API address : {}:{}", config.server.api_host, config.server.api_port);
        println!("   Database    : {}", config.database.connection_url());
        println!("   Log level   : {}", config.logging.level);
        println!("   Locations   : {}", config.catalog.len());
        return Ok(());
    }

    init_tracing(&config);
    info!("Configuration loaded from {}", config_path.display());
    if let Some(port) = cli.api_port {
        info!("CLI override: api_port = {}", port);
    }

    let handle = ServerHandle::start(ServerOptions {
        config,
        auto_migrate: !cli.no_migrate,
    })
    .await?;

    handle.install_signal_handler();
    info!("Press Ctrl+C to shut down gracefully.");

    handle.shutdown_signal().wait().await;
    handle.wait().await;

    Ok(())
}
