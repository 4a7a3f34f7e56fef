//! Keel CQRS: type-keyed command and query dispatch.
//!
//! Commands go through [`CommandBus::dispatch`], which validates them,
//! routes them to exactly one registered handler and always answers with a
//! [`CommandResult`]. Queries go through [`QueryBus::execute`] and answer
//! with a [`QueryResult`]. Neither bus returns an error or lets a handler
//! panic escape.

pub mod command;
pub mod command_bus;
pub mod config;
pub mod envelope;
pub mod query;
pub mod query_bus;
pub mod result;
pub mod stats;

pub use command::{Command, ValidationError};
pub use command_bus::CommandBus;
pub use config::CqrsConfig;
pub use envelope::Envelope;
pub use query::Query;
pub use query_bus::QueryBus;
pub use result::{CommandResult, QueryResult};
pub use stats::BusStats;
