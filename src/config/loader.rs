//! Configuration loading from disk and the process environment.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::config::schema::{AppConfig, Environment};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value {value:?} for {key}: {reason}")]
    Env {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration: defaults, then the optional TOML file, then the
/// process environment. The result is validated before it is returned.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    load_config_with(path, |key| std::env::var(key).ok())
}

/// Same as [`load_config`] with an injectable environment lookup.
pub fn load_config_with<F>(path: Option<&Path>, lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => from_file(path)?,
        None => AppConfig::default(),
    };

    apply_env(&mut config, lookup)?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Parse a TOML config file without applying the environment.
pub fn from_file(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Overlay recognised environment variables onto `config`.
///
/// Empty values are treated as unset.
pub fn apply_env<F>(config: &mut AppConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(env) = get("NODE_ENV") {
        config.environment = Environment::from_name(&env);
    }
    if let Some(host) = get("HOST") {
        config.listener.host = host;
    }
    if let Some(port) = get("PORT") {
        config.listener.port = parse("PORT", &port)?;
    }

    if let Some(uri) = get("MONGO_URI") {
        config.database.uri = uri;
    }
    if let Some(size) = get("MONGO_POOL_SIZE") {
        config.database.max_pool_size = parse("MONGO_POOL_SIZE", &size)?;
    }
    if let Some(size) = get("MONGO_MIN_POOL_SIZE") {
        config.database.min_pool_size = parse("MONGO_MIN_POOL_SIZE", &size)?;
    }

    if let Some(origins) = get("FRONTEND_URL") {
        config.cors.allowed_origins = Some(origins);
    }
    if let Some(dir) = get("FRONTEND_DIST") {
        config.frontend.dist_dir = PathBuf::from(dir);
    }

    if let Some(level) = get("LOG_LEVEL") {
        config.observability.log_level = Some(level);
    }
    if let Some(dir) = get("LOG_DIR") {
        config.observability.log_dir = Some(PathBuf::from(dir));
    }
    if let Some(addr) = get("METRICS_ADDRESS") {
        config.observability.metrics_address = Some(addr);
    }
    if let Some(dsn) = get("SENTRY_DSN") {
        config.observability.sentry_dsn = Some(dsn);
    }

    if let Some(drain) = get("SHUTDOWN_DRAIN") {
        config.lifecycle.drain_in_flight = parse_bool("SHUTDOWN_DRAIN", &drain)?;
    }
    if let Some(secs) = get("SHUTDOWN_DRAIN_TIMEOUT_SECS") {
        config.lifecycle.drain_timeout_secs = parse("SHUTDOWN_DRAIN_TIMEOUT_SECS", &secs)?;
    }

    Ok(())
}

fn parse<T>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Env {
        key,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Env {
            key,
            value: value.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_env_overrides_defaults() {
        let config = load_config_with(
            None,
            env(&[
                ("PORT", "8080"),
                ("NODE_ENV", "production"),
                ("MONGO_URI", "mongodb://db:27017/app"),
                ("MONGO_POOL_SIZE", "20"),
                ("MONGO_MIN_POOL_SIZE", "5"),
                ("FRONTEND_URL", "https://a.com, https://b.com"),
                ("LOG_LEVEL", "warn"),
                ("SENTRY_DSN", "https://key@example.invalid/1"),
            ]),
        )
        .unwrap();

        assert_eq!(config.listener.port, 8080);
        assert!(config.environment.is_production());
        assert_eq!(config.database.uri, "mongodb://db:27017/app");
        assert_eq!(config.database.max_pool_size, 20);
        assert_eq!(config.database.min_pool_size, 5);
        assert_eq!(
            config.cors.allowed_origins.as_deref(),
            Some("https://a.com, https://b.com")
        );
        assert_eq!(config.observability.log_level.as_deref(), Some("warn"));
        assert!(config.observability.sentry_dsn.is_some());
    }

    #[test]
    fn test_malformed_port_names_the_key() {
        let err = load_config_with(None, env(&[("PORT", "eighty")])).unwrap_err();
        match err {
            ConfigError::Env { key, .. } => assert_eq!(key, "PORT"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_values_are_ignored() {
        let config = load_config_with(None, env(&[("PORT", ""), ("FRONTEND_URL", "  ")])).unwrap();
        assert_eq!(config.listener.port, 5000);
        assert!(config.cors.allowed_origins.is_none());
    }

    #[test]
    fn test_file_then_env() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "environment = \"production\"\n[listener]\nport = 7000\n[lifecycle]\ndrain_in_flight = true"
        )
        .unwrap();

        let config = load_config_with(Some(file.path()), env(&[("PORT", "7001")])).unwrap();
        assert!(config.environment.is_production());
        assert_eq!(config.listener.port, 7001);
        assert!(config.lifecycle.drain_in_flight);
    }

    #[test]
    fn test_shutdown_drain_bool() {
        let config = load_config_with(None, env(&[("SHUTDOWN_DRAIN", "yes")])).unwrap();
        assert!(config.lifecycle.drain_in_flight);
        assert!(load_config_with(None, env(&[("SHUTDOWN_DRAIN", "maybe")])).is_err());
    }

    #[test]
    fn test_validation_runs_after_overlay() {
        let err = load_config_with(
            None,
            env(&[("MONGO_POOL_SIZE", "1"), ("MONGO_MIN_POOL_SIZE", "4")]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }
}
