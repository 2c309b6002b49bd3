//! Pulse API server library.
//!
//! An HTTP API backed by a document database, with an ordered request
//! pipeline, process health reporting and a lifecycle controller that owns
//! startup and shutdown.

pub mod config;
pub mod database;
pub mod error;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pipeline;
pub mod security;

pub use config::AppConfig;
pub use error::ApiError;
pub use http::HttpServer;
pub use lifecycle::{LifecycleController, Shutdown};
