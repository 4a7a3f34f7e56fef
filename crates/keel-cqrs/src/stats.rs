//! Dispatch counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Point-in-time copy of a bus's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BusStats {
    /// Commands dispatched, whatever the outcome.
    pub commands_processed: u64,
    /// Commands that ended in a failed result.
    pub command_errors: u64,
    /// Commands that ended in a rejected result.
    pub commands_rejected: u64,
    /// Queries executed, whatever the outcome.
    pub queries_processed: u64,
    /// Queries that ended in an error result.
    pub query_errors: u64,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) processed: AtomicU64,
    pub(crate) errors: AtomicU64,
    pub(crate) rejected: AtomicU64,
}

impl Counters {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn load(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}

impl BusStats {
    /// Adds two sets of counters, typically the command bus's and the
    /// query bus's.
    #[must_use]
    pub fn combined(self, other: Self) -> Self {
        Self {
            commands_processed: self.commands_processed + other.commands_processed,
            command_errors: self.command_errors + other.command_errors,
            commands_rejected: self.commands_rejected + other.commands_rejected,
            queries_processed: self.queries_processed + other.queries_processed,
            query_errors: self.query_errors + other.query_errors,
        }
    }
}
