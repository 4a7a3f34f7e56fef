//! Query abstractions.

use std::fmt;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A read intention routed to exactly one handler. Queries are never
/// validated by the bus.
pub trait Query: Send + fmt::Debug + 'static {
    /// Registration key for this query type.
    const QUERY_TYPE: &'static str;

    /// Unique identifier of this query instance.
    fn id(&self) -> Uuid;

    /// Time the query was created.
    fn timestamp(&self) -> DateTime<Utc>;
}
