//! Clock abstraction so event, snapshot and saga timestamps stay testable.

use std::sync::Arc;

use chrono::{DateTime, Utc};

/// Source of "now" for everything that stamps a timestamp.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// A clock shared between the store, the buses and the orchestrator.
pub type SharedClock = Arc<dyn Clock>;

/// Production clock that delegates to the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to one instant, for this crate's unit tests. Other crates
/// use `keel_test_support::FixedClock`.
#[cfg(test)]
#[derive(Debug, Clone, Copy)]
pub(crate) struct FixedClock(pub DateTime<Utc>);

#[cfg(test)]
impl FixedClock {
    /// 2026-01-15 10:00:00 UTC.
    pub(crate) fn at_default() -> Self {
        use chrono::TimeZone;
        Self(Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap())
    }
}

#[cfg(test)]
impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
