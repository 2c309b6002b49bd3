//! Computed-on-read health views.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use std::sync::Arc;
use std::time::Instant;

use crate::config::Environment;
use crate::health::memory::MemoryUsage;
use crate::health::state::{ConnectionCell, DatabaseStatus};

/// Overall service status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Ok,
    Degraded,
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    pub status: ServiceStatus,
    #[serde(rename = "uptime")]
    pub uptime_seconds: f64,
    #[serde(rename = "timestamp", serialize_with = "serialize_timestamp")]
    pub timestamp_utc: DateTime<Utc>,
    pub environment: Environment,
    #[serde(rename = "database")]
    pub database_state: DatabaseStatus,
    pub memory: MemoryUsage,
}

impl HealthSnapshot {
    pub fn is_connected(&self) -> bool {
        self.database_state == DatabaseStatus::Connected
    }
}

/// Body of `GET /api/status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub status: &'static str,
    pub database: DatabaseStatus,
    pub uptime: f64,
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Utc>,
}

/// Read-only handle over process uptime and database readiness.
#[derive(Debug, Clone)]
pub struct HealthState {
    connection: Arc<ConnectionCell>,
    started_at: Instant,
    environment: Environment,
}

impl HealthState {
    pub fn new(connection: Arc<ConnectionCell>, environment: Environment) -> Self {
        Self {
            connection,
            started_at: Instant::now(),
            environment,
        }
    }

    pub fn database_status(&self) -> DatabaseStatus {
        DatabaseStatus::from(self.connection.get())
    }

    pub fn uptime_seconds(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    /// Build a fresh snapshot. Never cached.
    pub fn snapshot(&self) -> HealthSnapshot {
        let database_state = self.database_status();
        let status = match database_state {
            DatabaseStatus::Connected => ServiceStatus::Ok,
            DatabaseStatus::Disconnected => ServiceStatus::Degraded,
        };

        HealthSnapshot {
            status,
            uptime_seconds: self.uptime_seconds(),
            timestamp_utc: Utc::now(),
            environment: self.environment,
            database_state,
            memory: MemoryUsage::current(),
        }
    }

    pub fn status_report(&self) -> StatusReport {
        StatusReport {
            status: "operational",
            database: self.database_status(),
            uptime: self.uptime_seconds(),
            timestamp: Utc::now(),
        }
    }
}

fn serialize_timestamp<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
}
