//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the API server.
//! All types derive Serde traits for deserialization from config files, and every
//! section falls back to its defaults so an empty file is a valid config.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration for the API server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Deployment environment (`NODE_ENV`).
    pub environment: Environment,

    /// Listener configuration (bind host and port).
    pub listener: ListenerConfig,

    /// Document database connection settings.
    pub database: DatabaseConfig,

    /// Cross-origin policy settings.
    pub cors: CorsConfig,

    /// Response hardening and request limits.
    pub security: SecurityConfig,

    /// Logging, metrics and error reporting.
    pub observability: ObservabilityConfig,

    /// Bundled client build served in production.
    pub frontend: FrontendConfig,

    /// Startup and shutdown behaviour.
    pub lifecycle: LifecycleConfig,
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Test,
    Production,
}

impl Environment {
    /// Parse an environment name. Unknown names fall back to development.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "production" => Environment::Production,
            "test" => Environment::Test,
            _ => Environment::Development,
        }
    }

    pub fn is_production(self) -> bool {
        self == Environment::Production
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Test => "test",
            Environment::Production => "production",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Interface to bind (e.g., "0.0.0.0").
    pub host: String,

    /// TCP port (`PORT`).
    pub port: u16,
}

impl ListenerConfig {
    /// Address string handed to the TCP listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection string (`MONGO_URI`).
    pub uri: String,

    /// Maximum pooled connections (`MONGO_POOL_SIZE`).
    pub max_pool_size: u32,

    /// Minimum pooled connections kept warm (`MONGO_MIN_POOL_SIZE`).
    pub min_pool_size: u32,

    /// How long the driver waits to find a usable server, in milliseconds.
    pub server_selection_timeout_ms: u64,

    /// Timeout for establishing a single connection, in milliseconds.
    pub connect_timeout_ms: u64,

    /// Application name reported to the server.
    pub app_name: String,
}

impl DatabaseConfig {
    pub fn server_selection_timeout(&self) -> Duration {
        Duration::from_millis(self.server_selection_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Outer bound on the startup connect. Longer than server selection so
    /// the driver's own selection error wins when it fires.
    pub fn startup_timeout(&self) -> Duration {
        self.server_selection_timeout() + self.connect_timeout()
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            uri: "mongodb://localhost:27017/pulse".to_string(),
            max_pool_size: 10,
            min_pool_size: 2,
            server_selection_timeout_ms: 5000,
            connect_timeout_ms: 10_000,
            app_name: "pulse-api".to_string(),
        }
    }
}

/// Cross-origin configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CorsConfig {
    /// Raw comma-separated allow-list (`FRONTEND_URL`).
    pub allowed_origins: Option<String>,
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Body size ceiling for decoded (JSON/form) bodies, in bytes.
    pub max_body_bytes: usize,

    /// Force the content-security-policy header on or off.
    /// When unset it follows the environment (on in production only).
    pub content_security_policy: Option<bool>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 10 * 1024 * 1024, // 10MB
            content_security_policy: None,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log filter directive (`LOG_LEVEL`). Defaults by environment.
    pub log_level: Option<String>,

    /// Directory for `combined.log`/`error.log` in production.
    pub log_dir: Option<PathBuf>,

    /// Prometheus exporter bind address; no exporter when unset.
    pub metrics_address: Option<String>,

    /// DSN for the external error-reporting service (`SENTRY_DSN`).
    pub sentry_dsn: Option<String>,
}

impl ObservabilityConfig {
    /// Effective log filter for the given environment.
    pub fn effective_log_level(&self, environment: Environment) -> String {
        match &self.log_level {
            Some(level) if !level.trim().is_empty() => level.trim().to_string(),
            _ if environment.is_production() => "info".to_string(),
            _ => "debug".to_string(),
        }
    }

    pub fn metrics_socket_addr(&self) -> Option<Result<SocketAddr, std::net::AddrParseError>> {
        self.metrics_address.as_deref().map(str::parse)
    }
}

/// Client build configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FrontendConfig {
    /// Directory holding the built client (`index.html` plus assets).
    pub dist_dir: PathBuf,
}

impl FrontendConfig {
    pub fn index_file(&self) -> PathBuf {
        self.dist_dir.join("index.html")
    }
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            dist_dir: PathBuf::from("../frontend/dist"),
        }
    }
}

/// Lifecycle configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Wait for in-flight requests before closing the database on shutdown.
    pub drain_in_flight: bool,

    /// Upper bound on the drain phase, in seconds.
    pub drain_timeout_secs: u64,
}

impl LifecycleConfig {
    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            drain_in_flight: false,
            drain_timeout_secs: 30,
        }
    }
}
