//! Database connection state cell.
//!
//! # States
//! - Connecting: initial connect in progress
//! - Connected: driver reports a usable server
//! - Disconnected: driver lost the server (it keeps reconnecting on its own)
//! - Errored: the driver reported an error
//!
//! # State Transitions
//! ```text
//! Connecting → Connected | Errored
//! Connected  → Disconnected | Errored
//! Disconnected | Errored → Connected
//! ```
//!
//! Only [`crate::database::ConnectionMonitor`] writes the cell. Readers take a
//! single atomic load; nothing holds a lock across I/O.

use serde::Serialize;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Readiness of the database connection.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting = 0,
    Connected = 1,
    Disconnected = 2,
    Errored = 3,
}

impl From<u8> for ConnectionState {
    fn from(val: u8) -> Self {
        match val {
            1 => ConnectionState::Connected,
            2 => ConnectionState::Disconnected,
            3 => ConnectionState::Errored,
            _ => ConnectionState::Connecting,
        }
    }
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Errored => "errored",
        }
    }
}

/// The two values clients ever see for the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseStatus {
    Connected,
    Disconnected,
}

impl From<ConnectionState> for DatabaseStatus {
    fn from(state: ConnectionState) -> Self {
        match state {
            ConnectionState::Connected => DatabaseStatus::Connected,
            _ => DatabaseStatus::Disconnected,
        }
    }
}

/// Process-wide connection state, shared via `Arc`.
#[derive(Debug)]
pub struct ConnectionCell {
    state: AtomicU8,
}

impl ConnectionCell {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: AtomicU8::new(ConnectionState::Connecting as u8),
        })
    }

    pub fn get(&self) -> ConnectionState {
        ConnectionState::from(self.state.load(Ordering::Acquire))
    }

    /// Store a new state, returning the previous one.
    pub(crate) fn set(&self, state: ConnectionState) -> ConnectionState {
        ConnectionState::from(self.state.swap(state as u8, Ordering::AcqRel))
    }
}
