//! Pulse API server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ SetRequestId ─▶ Pipeline ─────────────────────────────▶ Router
//!                                     security headers                        /health
//!                                     origin policy                           /api, /api/status, /api/test
//!                                     body decoder                            SPA catch-all (production)
//!                                     access log                              404 fallback
//!     Client Response                        │
//!     ◀────────────── error handler ◀────────┘
//!
//!     LifecycleController: connect database → bind → serve → signal → close database
//!     ConnectionMonitor (driver callbacks) → ConnectionState → /health, /api/status
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::Instrument;

use pulse_api::config::{load_config, validation::validate_config, ConfigError};
use pulse_api::database::MongoDatabase;
use pulse_api::lifecycle::{signals, LifecycleController, Shutdown};
use pulse_api::observability::{init_logging, logging::SERVICE_NAME, metrics};

#[derive(Parser)]
#[command(name = "pulse-api")]
#[command(about = "HTTP API server with health reporting", long_about = None)]
struct Cli {
    /// Optional TOML configuration file. Environment variables override it.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listening port, overriding PORT and the file.
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("pulse-api: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(port) = cli.port {
        config.listener.port = port;
        if let Err(errors) = validate_config(&config) {
            eprintln!("pulse-api: {}", ConfigError::Validation(errors));
            return ExitCode::FAILURE;
        }
    }

    if let Err(e) = init_logging(&config) {
        eprintln!("pulse-api: {e}");
        return ExitCode::FAILURE;
    }

    let root = tracing::info_span!("service", service = SERVICE_NAME);
    async move {
        tracing::info!(
            version = env!("CARGO_PKG_VERSION"),
            environment = %config.environment,
            bind_address = %config.listener.bind_address(),
            "pulse-api starting"
        );

        match config.observability.metrics_socket_addr() {
            Some(Ok(addr)) => metrics::init_metrics(addr),
            Some(Err(e)) => tracing::error!(error = %e, "Failed to parse metrics address"),
            None => {}
        }
        if config.observability.sentry_dsn.is_some() {
            tracing::info!("Error reporting DSN configured");
        }

        let shutdown = Shutdown::new();
        signals::listen(shutdown.clone());

        let database = MongoDatabase::new(config.database.clone());
        let controller = LifecycleController::new(config, database, shutdown);

        match controller.run().await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                tracing::error!(error = %e, "pulse-api exiting with failure");
                ExitCode::FAILURE
            }
        }
    }
    .instrument(root)
    .await
}
