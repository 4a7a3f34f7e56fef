//! Domain layer for the Orders context.

pub mod aggregates;
pub mod commands;
pub mod events;
pub mod queries;
