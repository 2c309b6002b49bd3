//! Process health subsystem.
//!
//! # Data Flow
//! ```text
//! Database driver callbacks (database::ConnectionMonitor):
//!     connected / disconnected / error
//!     → state.rs (atomic ConnectionState cell)
//!
//! GET /health, GET /api/status:
//!     → snapshot.rs (fresh HealthSnapshot per read)
//!     → memory.rs (process memory sample)
//! ```
//!
//! # Design Decisions
//! - Snapshots are computed on every read, never cached
//! - Clients only ever see `connected` or `disconnected`
//! - `/health` answers 503 whenever the database is not connected

pub mod memory;
pub mod snapshot;
pub mod state;

pub use memory::MemoryUsage;
pub use snapshot::{HealthSnapshot, HealthState, ServiceStatus, StatusReport};
pub use state::{ConnectionCell, ConnectionState, DatabaseStatus};
