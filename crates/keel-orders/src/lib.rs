//! Keel Orders: reference bounded context.
//!
//! Orders are event-sourced aggregates written through the command bus and
//! read from an in-memory projection through the query bus. The
//! `order_placement` saga ties stock reservation, payment and order
//! creation together with compensating rollback.

pub mod application;
pub mod domain;
