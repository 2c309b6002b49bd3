//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events, stdout and production files)
//!     → metrics.rs (request counters and latency histograms)
//!
//! Pipeline:
//!     → access_log.rs (one event per completed request)
//!
//! Consumers:
//!     → Log aggregation (stdout, combined.log, error.log)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing in production
//! - Request ID is read from `x-request-id`, set before the pipeline runs
//! - Metrics recording is a no-op until the exporter is installed

pub mod access_log;
pub mod logging;
pub mod metrics;

pub use access_log::AccessLog;
pub use logging::{init_logging, LoggingError};
