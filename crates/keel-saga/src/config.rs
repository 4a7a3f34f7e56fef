//! Saga orchestration configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default number of executions kept in the orchestrator history.
pub const DEFAULT_HISTORY_LIMIT: usize = 1_000;

/// Retry, timeout, logging and retention settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SagaConfig {
    /// Extra attempts for a failing step action before compensation starts.
    /// Zero runs every action exactly once. Steps may override it.
    pub max_retries: u32,
    /// Pause between attempts, in milliseconds.
    pub retry_delay_ms: u64,
    /// Overall saga budget in milliseconds. Informational; only per-step
    /// timeouts are enforced.
    pub timeout_ms: u64,
    /// Emit `info`-level lifecycle logs for each execution.
    pub enable_logging: bool,
    /// Executions retained in history; the oldest is evicted first.
    pub history_limit: usize,
}

impl Default for SagaConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            retry_delay_ms: 1_000,
            timeout_ms: 30_000,
            enable_logging: true,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl SagaConfig {
    /// Sets the default retry count.
    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Sets the delay between attempts.
    #[must_use]
    pub fn with_retry_delay_ms(mut self, ms: u64) -> Self {
        self.retry_delay_ms = ms;
        self
    }

    /// Sets the overall saga budget.
    #[must_use]
    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = ms;
        self
    }

    /// Enables or disables lifecycle logging.
    #[must_use]
    pub fn with_logging(mut self, enabled: bool) -> Self {
        self.enable_logging = enabled;
        self
    }

    /// Sets the history bound.
    #[must_use]
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Delay between attempts as a `Duration`.
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_run_each_action_once() {
        let config = SagaConfig::default();

        assert_eq!(config.max_retries, 0);
        assert_eq!(config.retry_delay(), Duration::from_secs(1));
        assert_eq!(config.timeout_ms, 30_000);
        assert!(config.enable_logging);
        assert_eq!(config.history_limit, DEFAULT_HISTORY_LIMIT);
    }

    #[test]
    fn test_builders_override_fields() {
        let config = SagaConfig::default()
            .with_max_retries(2)
            .with_retry_delay_ms(5)
            .with_timeout_ms(100)
            .with_logging(false)
            .with_history_limit(3);

        assert_eq!(config.max_retries, 2);
        assert_eq!(config.retry_delay(), Duration::from_millis(5));
        assert_eq!(config.timeout_ms, 100);
        assert!(!config.enable_logging);
        assert_eq!(config.history_limit, 3);
    }
}
