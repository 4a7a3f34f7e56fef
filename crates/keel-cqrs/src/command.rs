//! Command abstractions.

use std::fmt;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Reason a command was refused before reaching its handler.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ValidationError(String);

impl ValidationError {
    /// Creates a validation error with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    /// Shorthand for a missing mandatory field: `"<field> required"`.
    #[must_use]
    pub fn required(field: &str) -> Self {
        Self(format!("{field} required"))
    }

    /// Returns the message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.0
    }
}

/// A write intention routed to exactly one handler.
///
/// Implementors are plain field structs; the type tag is a compile-time
/// constant used as the bus registration key.
pub trait Command: Send + fmt::Debug + 'static {
    /// Registration key for this command type.
    const COMMAND_TYPE: &'static str;

    /// Unique identifier of this command instance.
    fn id(&self) -> Uuid;

    /// Time the command was created.
    fn timestamp(&self) -> DateTime<Utc>;

    /// Checks the command before dispatch. The default accepts everything.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` describing the first violated rule.
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}
