//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → headers.rs (protective response headers, CSP outside development)
//!     → access_control.rs (Origin allow-list, CORS response headers, preflight)
//!     → limits.rs (body size ceiling, JSON / form decoding)
//!     → Pass to access logging and routing
//! ```
//!
//! # Design Decisions
//! - Origin policy fixed at startup, never re-read per request
//! - Requests without an Origin are never blocked by the policy
//! - Header stage runs first so every response is covered

pub mod access_control;
pub mod headers;
pub mod limits;

pub use access_control::{OriginDecision, OriginGate, OriginPolicy};
pub use headers::SecurityHeaders;
pub use limits::BodyDecoder;
