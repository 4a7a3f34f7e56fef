//! Saga error types.

use thiserror::Error;

use crate::execution::SagaExecution;
use crate::step::StepError;

/// A step action failed; compensation has already run.
#[derive(Debug, Error)]
#[error("saga step '{step_name}' failed: {source}")]
pub struct StepFailure {
    /// Name of the failing step.
    pub step_name: String,
    /// The action's error.
    pub source: StepError,
}

/// Errors returned by [`SagaOrchestrator::execute`](crate::SagaOrchestrator::execute).
#[derive(Debug, Error)]
pub enum SagaError {
    /// No saga is registered under the requested name.
    #[error("no saga registered with name: {0}")]
    UnknownSaga(String),

    /// A step failed and the completed steps were compensated.
    #[error("saga step '{step_name}' failed: {source}")]
    StepFailed {
        /// Name of the failing step.
        step_name: String,
        /// The action's error.
        source: StepError,
        /// The finished execution, for inspection.
        execution: Box<SagaExecution>,
    },
}

impl SagaError {
    /// The finished execution, when a step failed.
    #[must_use]
    pub fn execution(&self) -> Option<&SagaExecution> {
        match self {
            Self::UnknownSaga(_) => None,
            Self::StepFailed { execution, .. } => Some(execution),
        }
    }

    /// Name of the failing step, when a step failed.
    #[must_use]
    pub fn step_name(&self) -> Option<&str> {
        match self {
            Self::UnknownSaga(_) => None,
            Self::StepFailed { step_name, .. } => Some(step_name),
        }
    }
}
