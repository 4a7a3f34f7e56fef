//! Shared test doubles and utilities for the Keel workflow crates.

mod clock;
mod recorder;
mod store;

pub use clock::FixedClock;
pub use recorder::StepLog;
pub use store::FailingEventStore;
