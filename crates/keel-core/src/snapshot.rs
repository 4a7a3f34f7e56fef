//! Point-in-time aggregate snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::event::Payload;

/// Materialized aggregate state at a given version.
///
/// Stores keep at most one snapshot per aggregate; saving a newer one
/// replaces the previous.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Aggregate this snapshot belongs to.
    pub aggregate_id: String,
    /// Aggregate version the state reflects.
    pub version: i64,
    /// Serialized aggregate state.
    pub state: Payload,
    /// When the snapshot was taken.
    pub timestamp: DateTime<Utc>,
}

impl Snapshot {
    /// Creates a snapshot stamped with the clock's current time.
    #[must_use]
    pub fn new(
        aggregate_id: impl Into<String>,
        version: i64,
        state: Payload,
        clock: &dyn Clock,
    ) -> Self {
        Self {
            aggregate_id: aggregate_id.into(),
            version,
            state,
            timestamp: clock.now(),
        }
    }
}
