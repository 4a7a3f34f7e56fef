//! Keel API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use keel_core::error::DomainError;
use keel_cqrs::{CommandResult, QueryResult};
use keel_saga::SagaError;
use serde::Serialize;
use thiserror::Error;

/// Startup and runtime errors for the API server.
#[derive(Debug, Error)]
pub enum AppError {
    /// An environment variable is invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Network binding or I/O error.
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

/// JSON body returned for error responses.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub error: &'static str,
    /// Human-readable error message.
    pub message: String,
    /// Failing saga step, for saga failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    /// Failing saga execution, for saga failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<String>,
}

/// Request failures, rendered as JSON error bodies.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A domain error raised outside the buses.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// The requested resource does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The request body or parameters are malformed.
    #[error("{0}")]
    BadRequest(String),

    /// The command was refused by validation or a business rule.
    #[error("{0}")]
    Rejected(String),

    /// The command or query failed.
    #[error("{0}")]
    Failed(String),

    /// A saga step failed; completed steps were compensated.
    #[error("Saga failed at step '{step}': {detail}")]
    SagaFailed {
        /// Name of the failing step.
        step: String,
        /// The step's error message.
        detail: String,
        /// The retained execution.
        execution_id: Option<String>,
    },
}

impl ApiError {
    /// Converts an unsuccessful command result; `None` for success.
    #[must_use]
    pub fn from_command(result: &CommandResult) -> Option<Self> {
        match result {
            CommandResult::Success(_) => None,
            CommandResult::Rejected(reason) => Some(Self::Rejected(reason.clone())),
            CommandResult::Failed(error) => Some(Self::Failed(error.clone())),
        }
    }

    /// Converts a query result error; `None` when the query succeeded.
    #[must_use]
    pub fn from_query(result: &QueryResult) -> Option<Self> {
        result.error().map(|error| Self::Failed(error.to_owned()))
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Domain(DomainError::AggregateNotFound(_)) | Self::NotFound(_) => {
                (StatusCode::NOT_FOUND, "not_found")
            }
            Self::Domain(DomainError::ConcurrencyConflict { .. }) => {
                (StatusCode::CONFLICT, "concurrency_conflict")
            }
            Self::Domain(DomainError::Validation(_)) | Self::BadRequest(_) => {
                (StatusCode::BAD_REQUEST, "validation_error")
            }
            Self::Domain(DomainError::NotConnected) => {
                (StatusCode::SERVICE_UNAVAILABLE, "not_connected")
            }
            Self::Domain(DomainError::Infrastructure(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "infrastructure_error")
            }
            Self::Rejected(_) => (StatusCode::CONFLICT, "command_rejected"),
            Self::Failed(_) => (StatusCode::BAD_REQUEST, "command_failed"),
            Self::SagaFailed { .. } => (StatusCode::BAD_REQUEST, "saga_failed"),
        }
    }
}

impl From<SagaError> for ApiError {
    fn from(err: SagaError) -> Self {
        match err {
            SagaError::UnknownSaga(name) => Self::NotFound(format!("saga not registered: {name}")),
            SagaError::StepFailed {
                step_name,
                source,
                execution,
            } => Self::SagaFailed {
                step: step_name,
                detail: source.to_string(),
                execution_id: Some(execution.id.to_string()),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = self.status_and_code();
        let message = self.to_string();
        let (step, execution_id) = match self {
            Self::SagaFailed {
                step, execution_id, ..
            } => (Some(step), execution_id),
            _ => (None, None),
        };

        let body = ErrorBody {
            error,
            message,
            step,
            execution_id,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_aggregate_not_found_maps_to_404() {
        assert_eq!(
            status_of(DomainError::AggregateNotFound("order-1".into()).into()),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_concurrency_conflict_maps_to_409() {
        assert_eq!(
            status_of(
                DomainError::ConcurrencyConflict {
                    aggregate_id: "order-1".into(),
                    expected: 1,
                    actual: 2,
                }
                .into()
            ),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_infrastructure_maps_to_500() {
        assert_eq!(
            status_of(DomainError::Infrastructure("disk full".into()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_command_results_map_by_outcome() {
        assert!(ApiError::from_command(&CommandResult::ok(serde_json::json!({}))).is_none());
        assert_eq!(
            status_of(ApiError::from_command(&CommandResult::rejected("no")).unwrap()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(ApiError::from_command(&CommandResult::fail("boom")).unwrap()),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_saga_failure_message_names_step() {
        let err = ApiError::SagaFailed {
            step: "process_payment".into(),
            detail: "card declined".into(),
            execution_id: None,
        };

        assert_eq!(
            err.to_string(),
            "Saga failed at step 'process_payment': card declined"
        );
        assert_eq!(status_of(err), StatusCode::BAD_REQUEST);
    }
}
