//! Keel event store backends.
//!
//! Only a process-local backend is provided; it implements the
//! [`EventStore`](keel_core::repository::EventStore) contract in full,
//! including optimistic appends and the auto-snapshot trigger.

pub mod config;
pub mod in_memory;

pub use config::EventSourcingConfig;
pub use in_memory::{EventStoreStats, InMemoryEventStore};
