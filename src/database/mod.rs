//! Database connection subsystem.
//!
//! # Data Flow
//! ```text
//! Lifecycle (Starting):
//!     Database::connect(monitor)
//!     → driver registers its event callbacks once
//!     → monitor.connected() | monitor.errored()
//!
//! Driver events (while Ready):
//!     topology has a selectable member → monitor.connected()
//!     topology lost every member       → monitor.disconnected()
//!     single member heartbeat failed   → logged only
//!
//! Lifecycle (Draining):
//!     Database::close()
//! ```
//!
//! # Design Decisions
//! - The driver owns reconnection; events only update state, never stop the listener
//! - `ConnectionMonitor` is the single writer of `ConnectionState`
//! - The trait is the seam tests use to substitute an in-memory driver

pub mod mongo;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::health::{ConnectionCell, ConnectionState};

pub use mongo::MongoDatabase;

/// Error type for database operations.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("invalid connection settings: {0}")]
    Config(String),

    #[error("failed to connect: {0}")]
    Connect(String),

    #[error("connection attempt timed out after {0:?}")]
    Timeout(Duration),

    #[error("failed to close connection: {0}")]
    Close(String),
}

/// A document database driver.
pub trait Database: Send + Sync + 'static {
    /// Open the connection and register event callbacks on `monitor`.
    fn connect(
        &self,
        monitor: ConnectionMonitor,
    ) -> impl Future<Output = Result<(), DatabaseError>> + Send;

    /// Close the connection. Best effort; no timeout is imposed here.
    fn close(&self) -> impl Future<Output = Result<(), DatabaseError>> + Send;

    /// Name of the database in use, once known.
    fn name(&self) -> Option<String>;
}

/// Callback surface handed to the driver. Clones share the same cell.
#[derive(Debug, Clone)]
pub struct ConnectionMonitor {
    cell: Arc<ConnectionCell>,
}

impl ConnectionMonitor {
    pub fn new(cell: Arc<ConnectionCell>) -> Self {
        Self { cell }
    }

    pub fn state(&self) -> ConnectionState {
        self.cell.get()
    }

    pub fn connecting(&self) {
        self.cell.set(ConnectionState::Connecting);
    }

    pub fn connected(&self) {
        let previous = self.cell.set(ConnectionState::Connected);
        match previous {
            ConnectionState::Connected => {}
            ConnectionState::Connecting => tracing::info!("Database connected successfully"),
            _ => tracing::info!(previous = previous.as_str(), "Database reconnected"),
        }
    }

    pub fn disconnected(&self) {
        let previous = self.cell.set(ConnectionState::Disconnected);
        if previous != ConnectionState::Disconnected {
            tracing::warn!(previous = previous.as_str(), "Database disconnected");
        }
    }

    pub fn errored(&self, error: &dyn std::error::Error) {
        self.cell.set(ConnectionState::Errored);
        tracing::error!(error = %error, "Database error");
    }
}
