//! Keel Core: event-sourcing primitives.
//!
//! This crate defines the event, aggregate and snapshot model and the
//! `EventStore` abstraction that every other Keel crate builds on. It
//! contains no storage backend of its own.

pub mod aggregate;
pub mod clock;
pub mod error;
pub mod event;
pub mod repository;
pub mod snapshot;
