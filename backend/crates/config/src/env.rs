use ordersync_common::error::{SyncError, SyncResult};
use serde::Deserialize;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

impl AppConfig {
    /// Load configuration from environment variables.
    /// Loads `.env` file if present, then reads required vars.
    pub fn from_env() -> SyncResult<Self> {
        // Best-effort .env load; ignore if missing
        let _ = dotenvy::dotenv();

        Ok(Self {
            database_url: get_var("DATABASE_URL")?,
            host: get_var_or("HOST", "0.0.0.0"),
            port: parse_var_or("PORT", 8080)?,
            log_level: get_var_or("LOG_LEVEL", "info"),
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

pub(crate) fn get_var(key: &str) -> SyncResult<String> {
    env::var(key).map_err(|_| SyncError::Config(format!("{key} is required but not set")))
}

pub(crate) fn get_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

/// Parse an optional env var, falling back to `default` when unset.
/// A var that is set but unparsable is a configuration error.
pub(crate) fn parse_var_or<T>(key: &str, default: T) -> SyncResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| SyncError::Config(format!("invalid {key}: {e}"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
pub(crate) static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn config_from_env_succeeds_with_required_vars() {
        let _guard = ENV_LOCK.lock().expect("env lock poisoned");

        env::set_var("DATABASE_URL", "postgres://localhost/ordersync_test");
        env::remove_var("PORT");

        let cfg = AppConfig::from_env().expect("should parse config");
        assert_eq!(cfg.database_url, "postgres://localhost/ordersync_test");
        assert_eq!(cfg.port, 8080);

        env::remove_var("DATABASE_URL");
    }

    #[test]
    fn config_from_env_fails_without_database_url() {
        let _guard = ENV_LOCK.lock().expect("env lock poisoned");

        env::remove_var("DATABASE_URL");
        let result = AppConfig::from_env();
        assert!(result.is_err());
    }

    #[test]
    fn config_from_env_rejects_bad_port() {
        let _guard = ENV_LOCK.lock().expect("env lock poisoned");

        env::set_var("DATABASE_URL", "postgres://localhost/ordersync_test");
        env::set_var("PORT", "not-a-port");
        let err = AppConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("invalid PORT"), "got: {err}");

        env::remove_var("PORT");
        env::remove_var("DATABASE_URL");
    }

    #[test]
    fn bind_addr_formats_correctly() {
        let cfg = AppConfig {
            database_url: String::new(),
            host: "127.0.0.1".to_owned(),
            port: 3000,
            log_level: "debug".to_owned(),
        };
        assert_eq!(cfg.bind_addr(), "127.0.0.1:3000");
    }
}
