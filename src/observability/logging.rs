//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once at startup
//! - Pick the output format from the environment
//! - Mirror production logs into `combined.log` and `error.log`
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for production, coloured human format for development
//! - Log level from `LOG_LEVEL`, defaulting to info (production) or debug

use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::config::AppConfig;

/// Recorded on the root span and on every request span.
pub const SERVICE_NAME: &str = "pulse-api";

/// Error type for logging initialisation.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("invalid log filter {filter:?}: {source}")]
    Filter {
        filter: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },

    #[error("cannot open log file {path}: {source}")]
    File {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("a global subscriber is already installed")]
    AlreadyInitialized,
}

/// Install the global subscriber for this process.
pub fn init_logging(config: &AppConfig) -> Result<(), LoggingError> {
    let environment = config.environment;
    let level = config.observability.effective_log_level(environment);
    let filter = EnvFilter::try_new(&level).map_err(|source| LoggingError::Filter {
        filter: level.clone(),
        source,
    })?;

    let production = environment.is_production();

    let json_stdout = production.then(|| fmt::layer().json().with_current_span(false));
    let text_stdout = (!production).then(|| fmt::layer().with_ansi(true).with_target(false));

    let (combined, errors) = match (&config.observability.log_dir, production) {
        (Some(dir), true) => {
            let combined = open_log(dir, "combined.log")?;
            let errors = open_log(dir, "error.log")?;
            (
                Some(fmt::layer().json().with_ansi(false).with_writer(Mutex::new(combined))),
                Some(
                    fmt::layer()
                        .json()
                        .with_ansi(false)
                        .with_writer(Mutex::new(errors))
                        .with_filter(LevelFilter::ERROR),
                ),
            )
        }
        _ => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(json_stdout)
        .with(text_stdout)
        .with(combined)
        .with(errors)
        .try_init()
        .map_err(|_| LoggingError::AlreadyInitialized)?;

    tracing::debug!(level = %level, environment = %environment, "Logging initialised");
    Ok(())
}

fn open_log(dir: &Path, name: &str) -> Result<File, LoggingError> {
    let path = dir.join(name);
    let file_error = |source| LoggingError::File {
        path: path.display().to_string(),
        source,
    };
    fs::create_dir_all(dir).map_err(file_error)?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(file_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_filter_is_reported() {
        let mut config = AppConfig::default();
        config.observability.log_level = Some("pulse_api=loud".into());
        assert!(matches!(
            init_logging(&config),
            Err(LoggingError::Filter { .. })
        ));
    }

    #[test]
    fn test_open_log_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("logs");
        open_log(&nested, "combined.log").unwrap();
        assert!(nested.join("combined.log").exists());
    }
}
