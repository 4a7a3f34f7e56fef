//! Keel saga orchestration.
//!
//! A [`Saga`] is a named, ordered list of [`SagaStep`]s. Running it through
//! the [`SagaOrchestrator`] executes the steps one by one against a shared
//! [`SagaContext`]; when a step fails, every step that already completed is
//! compensated in reverse completion order and the failure is returned as a
//! [`SagaError::StepFailed`].

pub mod config;
pub mod error;
pub mod execution;
pub mod orchestrator;
pub mod saga;
pub mod status;
pub mod step;

pub use config::SagaConfig;
pub use error::{SagaError, StepFailure};
pub use execution::{SagaExecution, StepRecord};
pub use orchestrator::{SagaOrchestrator, SagaStats};
pub use saga::Saga;
pub use status::{SagaStatus, StepStatus};
pub use step::{SagaContext, SagaStep, StepError, StepFuture};
