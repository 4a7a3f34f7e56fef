//! CQRS configuration.

use serde::{Deserialize, Serialize};

/// Settings carried by both buses.
///
/// The timeouts and retry count are informational: dispatch does not
/// enforce them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CqrsConfig {
    /// Whether command-side events are synchronized to read models.
    pub enable_event_sync: bool,
    /// Command execution budget in milliseconds.
    pub command_timeout_ms: u64,
    /// Query execution budget in milliseconds.
    pub query_timeout_ms: u64,
    /// Retry attempts for failed operations.
    pub max_retries: u32,
}

impl Default for CqrsConfig {
    fn default() -> Self {
        Self {
            enable_event_sync: true,
            command_timeout_ms: 5_000,
            query_timeout_ms: 3_000,
            max_retries: 3,
        }
    }
}

impl CqrsConfig {
    /// Enables or disables event synchronization.
    #[must_use]
    pub fn with_event_sync(mut self, enabled: bool) -> Self {
        self.enable_event_sync = enabled;
        self
    }

    /// Sets the command timeout.
    #[must_use]
    pub fn with_command_timeout_ms(mut self, ms: u64) -> Self {
        self.command_timeout_ms = ms;
        self
    }

    /// Sets the query timeout.
    #[must_use]
    pub fn with_query_timeout_ms(mut self, ms: u64) -> Self {
        self.query_timeout_ms = ms;
        self
    }

    /// Sets the retry count.
    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }
}
