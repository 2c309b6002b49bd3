//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum Router, layer order)
//!     → request.rs (request ID, panic capture)
//!     → pipeline (security headers, origin, body, access log)
//!     → handlers.rs (routes, SPA catch-all, 404 fallback)
//!     → response.rs (terminal error rendering)
//!     → Send to client
//! ```

pub mod handlers;
pub mod request;
pub mod response;
pub mod server;

pub use request::{MakeRequestUuid, X_REQUEST_ID};
pub use response::ErrorHandler;
pub use server::{AppState, HttpServer};
