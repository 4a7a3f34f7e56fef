//! Application layer for the Orders context.

pub mod command_handlers;
pub mod inventory;
pub mod payments;
pub mod placement_saga;
pub mod query_handlers;
pub mod read_model;
