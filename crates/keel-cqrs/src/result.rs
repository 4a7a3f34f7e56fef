//! Uniform outcomes returned by the buses.

use serde::{Serialize, Serializer};
use serde_json::Value;

const REJECTED_PREFIX: &str = "Rejected: ";

fn non_empty(message: String, fallback: &str) -> String {
    if message.trim().is_empty() {
        fallback.to_owned()
    } else {
        message
    }
}

/// Outcome of a command.
///
/// `Rejected` marks a command refused before execution (validation or a
/// business rule); `Failed` marks a missing handler or an execution error.
/// Serializes to `{success, data, error, status}`.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    /// The command was applied.
    Success(Value),
    /// The command could not be executed.
    Failed(String),
    /// The command was refused. The message starts with `"Rejected: "`.
    Rejected(String),
}

impl CommandResult {
    /// Successful result carrying `data`.
    #[must_use]
    pub fn ok(data: impl Into<Value>) -> Self {
        Self::Success(data.into())
    }

    /// Failed result. An empty message is replaced with a generic one.
    #[must_use]
    pub fn fail(error: impl Into<String>) -> Self {
        Self::Failed(non_empty(error.into(), "command failed"))
    }

    /// Rejected result with the reason prefixed by `"Rejected: "`.
    #[must_use]
    pub fn rejected(reason: impl Into<String>) -> Self {
        let reason = non_empty(reason.into(), "command refused");
        Self::Rejected(format!("{REJECTED_PREFIX}{reason}"))
    }

    /// Returns `true` for [`CommandResult::Success`].
    #[must_use]
    pub fn success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Returns `true` for [`CommandResult::Rejected`].
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }

    /// Result data of a successful command.
    #[must_use]
    pub fn data(&self) -> Option<&Value> {
        match self {
            Self::Success(data) => Some(data),
            Self::Failed(_) | Self::Rejected(_) => None,
        }
    }

    /// Error message of a failed or rejected command.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Success(_) => None,
            Self::Failed(error) | Self::Rejected(error) => Some(error),
        }
    }

    /// Status tag: `"success"`, `"failed"` or `"rejected"`.
    #[must_use]
    pub fn status(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::Failed(_) => "failed",
            Self::Rejected(_) => "rejected",
        }
    }
}

impl From<Value> for CommandResult {
    fn from(value: Value) -> Self {
        Self::ok(value)
    }
}

impl From<()> for CommandResult {
    fn from((): ()) -> Self {
        Self::ok(Value::Null)
    }
}

#[derive(Serialize)]
struct CommandResultBody<'a> {
    success: bool,
    data: Option<&'a Value>,
    error: Option<&'a str>,
    status: &'static str,
}

impl Serialize for CommandResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        CommandResultBody {
            success: self.success(),
            data: self.data(),
            error: self.error(),
            status: self.status(),
        }
        .serialize(serializer)
    }
}

/// Outcome of a query.
///
/// `found` is derived, never stored: it holds exactly when data is present
/// and no error was recorded. Serializes to `{found, data, error}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    data: Option<Value>,
    error: Option<String>,
}

impl QueryResult {
    /// Result carrying `data`. A JSON `null` counts as no data.
    #[must_use]
    pub fn ok(data: impl Into<Value>) -> Self {
        let data = data.into();
        Self {
            data: (!data.is_null()).then_some(data),
            error: None,
        }
    }

    /// Result with neither data nor error.
    #[must_use]
    pub fn not_found() -> Self {
        Self::default()
    }

    /// Failed result. An empty message is replaced with a generic one.
    #[must_use]
    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            data: None,
            error: Some(non_empty(error.into(), "query failed")),
        }
    }

    /// Returns `true` if data is present and no error was recorded.
    #[must_use]
    pub fn found(&self) -> bool {
        self.data.is_some() && self.error.is_none()
    }

    /// Result data, if any.
    #[must_use]
    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    /// Error message, if any.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Consumes the result, returning its data.
    #[must_use]
    pub fn into_data(self) -> Option<Value> {
        self.data
    }
}

impl From<Value> for QueryResult {
    fn from(value: Value) -> Self {
        Self::ok(value)
    }
}

impl From<Option<Value>> for QueryResult {
    fn from(value: Option<Value>) -> Self {
        value.map_or_else(Self::not_found, Self::ok)
    }
}

#[derive(Serialize)]
struct QueryResultBody<'a> {
    found: bool,
    data: Option<&'a Value>,
    error: Option<&'a str>,
}

impl Serialize for QueryResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        QueryResultBody {
            found: self.found(),
            data: self.data(),
            error: self.error(),
        }
        .serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ok_is_success_without_error() {
        let result = CommandResult::ok(json!({"id": "123"}));

        assert!(result.success());
        assert!(result.error().is_none());
        assert_eq!(result.data(), Some(&json!({"id": "123"})));
        assert_eq!(result.status(), "success");
    }

    #[test]
    fn test_fail_and_rejected_carry_non_empty_errors() {
        let failed = CommandResult::fail("boom");
        let rejected = CommandResult::rejected("x required");
        let blank = CommandResult::fail("");

        assert!(!failed.success());
        assert_eq!(failed.error(), Some("boom"));
        assert!(!rejected.success());
        assert!(rejected.is_rejected());
        assert_eq!(rejected.error(), Some("Rejected: x required"));
        assert!(!blank.error().unwrap().is_empty());
    }

    #[test]
    fn test_command_result_wire_shape() {
        // Arrange
        let result = CommandResult::rejected("Order already shipped");

        // Act
        let wire = serde_json::to_value(&result).unwrap();

        // Assert
        assert_eq!(
            wire,
            json!({
                "success": false,
                "data": null,
                "error": "Rejected: Order already shipped",
                "status": "rejected",
            })
        );
    }

    #[test]
    fn test_raw_values_convert_to_success() {
        let from_value: CommandResult = json!(7).into();
        let from_unit: CommandResult = ().into();

        assert_eq!(from_value, CommandResult::ok(json!(7)));
        assert!(from_unit.success());
    }

    #[test]
    fn test_query_found_is_derived() {
        let cases = [
            (QueryResult::ok(json!({"a": 1})), true),
            (QueryResult::ok(Value::Null), false),
            (QueryResult::not_found(), false),
            (QueryResult::fail("db down"), false),
            (QueryResult::from(None), false),
            (QueryResult::from(Some(json!([]))), true),
        ];

        for (result, expected) in cases {
            assert_eq!(result.found(), expected, "{result:?}");
            assert_eq!(
                result.found(),
                result.data().is_some() && result.error().is_none()
            );
        }
    }

    #[test]
    fn test_query_result_wire_shape() {
        let wire = serde_json::to_value(QueryResult::ok(json!({"id": "o-1"}))).unwrap();

        assert_eq!(
            wire,
            json!({"found": true, "data": {"id": "o-1"}, "error": null})
        );
    }
}
