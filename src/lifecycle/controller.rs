//! Process lifecycle state machine.
//!
//! ```text
//! Starting ──connect ok──────────────▶ Ready { degraded: false }
//!    │     ──connect failed (prod)───▶ Ready { degraded: true }
//!    │     ──connect failed (other)──▶ Stopped (error)
//! Ready ──shutdown signal──▶ Draining ──close database──▶ Stopped
//! ```

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::AppConfig;
use crate::database::{ConnectionMonitor, Database, DatabaseError};
use crate::health::{ConnectionCell, HealthState};
use crate::http::HttpServer;
use crate::lifecycle::Shutdown;

/// Observable lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Starting,
    Ready { addr: SocketAddr, degraded: bool },
    Draining,
    Stopped,
}

/// Error type for the process lifecycle. Any of these means exit code 1.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("initial database connection failed: {0}")]
    DatabaseConnect(#[source] DatabaseError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] io::Error),

    #[error("failed to close database connection: {0}")]
    Close(#[source] DatabaseError),
}

/// Owns startup and shutdown of the database connection and the listener.
pub struct LifecycleController<D> {
    config: Arc<AppConfig>,
    database: D,
    connection: Arc<ConnectionCell>,
    health: HealthState,
    shutdown: Shutdown,
    phase: watch::Sender<Phase>,
}

impl<D: Database> LifecycleController<D> {
    pub fn new(config: AppConfig, database: D, shutdown: Shutdown) -> Self {
        let connection = ConnectionCell::new();
        let health = HealthState::new(connection.clone(), config.environment);
        let (phase, _) = watch::channel(Phase::Starting);
        Self {
            config: Arc::new(config),
            database,
            connection,
            health,
            shutdown,
            phase,
        }
    }

    /// Watch phase transitions.
    pub fn phases(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    /// Run until shutdown. `Ok` means a clean exit.
    pub async fn run(self) -> Result<(), LifecycleError> {
        let degraded = match self.connect_database().await {
            Ok(degraded) => degraded,
            Err(e) => {
                self.close_quietly().await;
                self.enter(Phase::Stopped);
                return Err(e);
            }
        };

        let address = self.config.listener.bind_address();
        let listener = match TcpListener::bind(&address).await {
            Ok(listener) => listener,
            Err(source) => {
                tracing::error!(address = %address, error = %source, "Failed to bind listener");
                self.close_quietly().await;
                self.enter(Phase::Stopped);
                return Err(LifecycleError::Bind { address, source });
            }
        };
        let addr = listener.local_addr().map_err(LifecycleError::Serve)?;

        let router = HttpServer::new(&self.config, self.health.clone()).into_router();
        self.enter(Phase::Ready { addr, degraded });
        tracing::info!(
            address = %addr,
            environment = %self.config.environment,
            degraded,
            database = self.database.name().as_deref().unwrap_or("-"),
            "Server listening"
        );

        let served = self.serve(listener, router).await;

        if *self.phase.borrow() != Phase::Draining {
            self.enter(Phase::Draining);
        }
        tracing::info!("Closing database connection");
        let closed = self.database.close().await;
        self.enter(Phase::Stopped);

        served?;
        match closed {
            Ok(()) => {
                tracing::info!("Database connection closed, shutdown complete");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "Error during shutdown");
                Err(LifecycleError::Close(e))
            }
        }
    }

    /// `Ok(true)` when the process should keep running without a database.
    async fn connect_database(&self) -> Result<bool, LifecycleError> {
        let monitor = ConnectionMonitor::new(self.connection.clone());
        let limit = self.config.database.startup_timeout();

        let result = match tokio::time::timeout(limit, self.database.connect(monitor.clone())).await {
            Ok(result) => result,
            Err(_) => {
                let e = DatabaseError::Timeout(limit);
                monitor.errored(&e);
                Err(e)
            }
        };

        match result {
            Ok(()) => Ok(false),
            Err(e) if self.config.environment.is_production() => {
                tracing::error!(error = %e, "Database connection failed, serving in degraded mode");
                Ok(true)
            }
            Err(e) => {
                tracing::error!(error = %e, "Database connection failed");
                Err(LifecycleError::DatabaseConnect(e))
            }
        }
    }

    async fn serve(&self, listener: TcpListener, router: Router) -> Result<(), LifecycleError> {
        let app = router.into_make_service_with_connect_info::<SocketAddr>();

        if !self.config.lifecycle.drain_in_flight {
            let mut server = tokio::spawn(async move { axum::serve(listener, app).await });
            return tokio::select! {
                joined = &mut server => flatten(joined),
                _ = self.shutdown.wait() => {
                    self.enter(Phase::Draining);
                    server.abort();
                    let _ = server.await;
                    Ok(())
                }
            };
        }

        let stop = self.shutdown.clone();
        let mut server: JoinHandle<io::Result<()>> = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { stop.wait().await })
                .await
        });

        tokio::select! {
            joined = &mut server => return flatten(joined),
            _ = self.shutdown.wait() => self.enter(Phase::Draining),
        }

        let timeout = self.config.lifecycle.drain_timeout();
        tracing::info!(timeout_secs = timeout.as_secs(), "Draining in-flight requests");
        match tokio::time::timeout(timeout, &mut server).await {
            Ok(joined) => flatten(joined),
            Err(_) => {
                tracing::warn!("Drain timeout elapsed, dropping remaining requests");
                server.abort();
                let _ = server.await;
                Ok(())
            }
        }
    }

    async fn close_quietly(&self) {
        if let Err(e) = self.database.close().await {
            tracing::warn!(error = %e, "Failed to close database connection");
        }
    }

    fn enter(&self, phase: Phase) {
        tracing::debug!(phase = ?phase, "Lifecycle transition");
        self.phase.send_replace(phase);
    }
}

fn flatten(joined: Result<io::Result<()>, tokio::task::JoinError>) -> Result<(), LifecycleError> {
    match joined {
        Ok(result) => result.map_err(LifecycleError::Serve),
        Err(e) => Err(LifecycleError::Serve(io::Error::other(e))),
    }
}
