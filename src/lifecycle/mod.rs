//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (controller.rs):
//!     Connect database (bounded) → Bind listener → Ready
//!
//! Shutdown (shutdown.rs, controller.rs):
//!     Signal received → Stop accepting → [drain in-flight] → Close database → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: database first, then the listener
//! - Production keeps serving without a database; other environments exit
//! - In-flight drain is opt-in and bounded by a timeout

pub mod controller;
pub mod shutdown;
pub mod signals;

pub use controller::{LifecycleController, LifecycleError, Phase};
pub use shutdown::Shutdown;
