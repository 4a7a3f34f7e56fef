//! Identity and creation time shared by commands and queries.

use chrono::{DateTime, Utc};
use keel_core::clock::Clock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generated id plus creation timestamp carried by every command and query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Unique message identifier.
    pub id: Uuid,
    /// Time the message was created.
    pub timestamp: DateTime<Utc>,
}

impl Envelope {
    /// Creates an envelope with a random id stamped at `clock.now()`.
    #[must_use]
    pub fn new(clock: &dyn Clock) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: clock.now(),
        }
    }
}
