//! Saga steps: an action plus an optional compensation.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use serde_json::Value;

/// Shared mutable context threaded through every step of one execution.
/// Owned by the caller; steps read their inputs from it and write their
/// outputs back into it.
pub type SagaContext = serde_json::Map<String, Value>;

/// Error returned by a step action or compensation.
pub type StepError = Box<dyn std::error::Error + Send + Sync>;

/// Future returned by a step action or compensation.
pub type StepFuture<'a> = BoxFuture<'a, Result<Value, StepError>>;

pub(crate) type StepFn = Arc<dyn for<'a> Fn(&'a mut SagaContext) -> StepFuture<'a> + Send + Sync>;

/// One unit of saga work.
///
/// Actions and compensations are closures returning a boxed future that
/// borrows the context:
///
/// ```ignore
/// SagaStep::new("charge", |ctx| async move {
///     ctx.insert("payment_id".into(), "pay-1".into());
///     Ok(Value::Null)
/// }.boxed())
/// ```
#[derive(Clone)]
pub struct SagaStep {
    name: String,
    pub(crate) action: StepFn,
    pub(crate) compensation: Option<StepFn>,
    timeout: Option<Duration>,
    max_retries: Option<u32>,
}

impl SagaStep {
    /// Creates a step with no compensation.
    #[must_use]
    pub fn new<F>(name: impl Into<String>, action: F) -> Self
    where
        F: for<'a> Fn(&'a mut SagaContext) -> StepFuture<'a> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            action: Arc::new(action),
            compensation: None,
            timeout: None,
            max_retries: None,
        }
    }

    /// Sets the action that undoes this step.
    #[must_use]
    pub fn with_compensation<F>(mut self, compensation: F) -> Self
    where
        F: for<'a> Fn(&'a mut SagaContext) -> StepFuture<'a> + Send + Sync + 'static,
    {
        self.compensation = Some(Arc::new(compensation));
        self
    }

    /// Fails the action if a single attempt runs longer than `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Overrides `SagaConfig::max_retries` for this step.
    #[must_use]
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    /// Step name, unique within its saga by convention.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` if the step can be undone.
    #[must_use]
    pub fn has_compensation(&self) -> bool {
        self.compensation.is_some()
    }

    /// Per-attempt timeout, if any.
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Per-step retry override, if any.
    #[must_use]
    pub fn max_retries(&self) -> Option<u32> {
        self.max_retries
    }
}

impl fmt::Debug for SagaStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SagaStep")
            .field("name", &self.name)
            .field("has_compensation", &self.has_compensation())
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}
