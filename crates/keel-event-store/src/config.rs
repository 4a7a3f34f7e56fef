//! Event sourcing configuration.

use serde::{Deserialize, Serialize};

/// Default number of events between automatic snapshot trigger points.
pub const DEFAULT_SNAPSHOT_INTERVAL: u32 = 100;

/// Default cap on events retained per aggregate.
pub const DEFAULT_MAX_EVENTS: usize = 10_000;

/// Snapshot and retention settings for an event store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSourcingConfig {
    /// Events between automatic snapshot trigger points. Zero disables the
    /// trigger.
    pub snapshot_interval: u32,
    /// Whether snapshots are taken at all.
    pub enable_snapshots: bool,
    /// Maximum events a single aggregate stream may hold.
    pub max_events: usize,
}

impl Default for EventSourcingConfig {
    fn default() -> Self {
        Self {
            snapshot_interval: DEFAULT_SNAPSHOT_INTERVAL,
            enable_snapshots: true,
            max_events: DEFAULT_MAX_EVENTS,
        }
    }
}

impl EventSourcingConfig {
    /// Preset for the in-memory store used in development and tests.
    #[must_use]
    pub fn memory() -> Self {
        Self::default()
    }

    /// Sets the snapshot interval.
    #[must_use]
    pub fn with_snapshot_interval(mut self, interval: u32) -> Self {
        self.snapshot_interval = interval;
        self
    }

    /// Enables or disables snapshots.
    #[must_use]
    pub fn with_snapshots(mut self, enabled: bool) -> Self {
        self.enable_snapshots = enabled;
        self
    }

    /// Sets the per-aggregate event cap.
    #[must_use]
    pub fn with_max_events(mut self, max: usize) -> Self {
        self.max_events = max;
        self
    }

    /// Returns `true` if appending from `from_version` to `to_version`
    /// crosses a snapshot trigger point.
    #[must_use]
    pub fn crosses_snapshot_point(&self, from_version: i64, to_version: i64) -> bool {
        if !self.enable_snapshots || self.snapshot_interval == 0 {
            return false;
        }
        let interval = i64::from(self.snapshot_interval);
        from_version / interval != to_version / interval
    }
}
