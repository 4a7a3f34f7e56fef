//! Server configuration read from the environment.

use std::str::FromStr;

use keel_event_store::EventSourcingConfig;
use keel_saga::SagaConfig;

use crate::error::AppError;

/// Runtime settings for the API server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// Bind address (`HOST`).
    pub host: String,
    /// Bind port (`PORT`).
    pub port: u16,
    /// Events between automatic snapshots (`SNAPSHOT_INTERVAL`).
    pub snapshot_interval: u32,
    /// Retries per saga step (`SAGA_MAX_RETRIES`).
    pub saga_max_retries: u32,
    /// Saga executions retained (`SAGA_HISTORY_LIMIT`).
    pub saga_history_limit: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_owned(),
            port: 3000,
            snapshot_interval: EventSourcingConfig::memory().snapshot_interval,
            saga_max_retries: SagaConfig::default().max_retries,
            saga_history_limit: SagaConfig::default().history_limit,
        }
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{key} must be valid: {e}"))),
        None => Ok(default),
    }
}

impl AppConfig {
    /// Reads the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, falling back to defaults
    /// for unset keys.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a value cannot be parsed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let defaults = Self::default();
        Ok(Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse(&lookup, "PORT", defaults.port)?,
            snapshot_interval: parse(&lookup, "SNAPSHOT_INTERVAL", defaults.snapshot_interval)?,
            saga_max_retries: parse(&lookup, "SAGA_MAX_RETRIES", defaults.saga_max_retries)?,
            saga_history_limit: parse(&lookup, "SAGA_HISTORY_LIMIT", defaults.saga_history_limit)?,
        })
    }

    /// Event store settings derived from this configuration.
    #[must_use]
    pub fn event_sourcing(&self) -> EventSourcingConfig {
        EventSourcingConfig::memory().with_snapshot_interval(self.snapshot_interval)
    }

    /// Saga orchestrator settings derived from this configuration.
    #[must_use]
    pub fn saga(&self) -> SagaConfig {
        SagaConfig::default()
            .with_max_retries(self.saga_max_retries)
            .with_history_limit(self.saga_history_limit)
    }

    /// `host:port` bind string.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
