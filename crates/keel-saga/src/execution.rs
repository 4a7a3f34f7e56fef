//! One run of a saga, with its per-step status log.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use keel_core::clock::Clock;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::SagaConfig;
use crate::error::StepFailure;
use crate::saga::Saga;
use crate::status::{SagaStatus, StepStatus};
use crate::step::{SagaContext, StepError, StepFn};

/// Status log entry for one step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepRecord {
    /// Step name.
    pub name: String,
    /// Current status.
    pub status: StepStatus,
    /// Value returned by the action, once completed.
    pub result: Option<Value>,
    /// Action error, once failed.
    pub error: Option<String>,
    /// Compensation error, if undoing the step failed.
    pub compensation_error: Option<String>,
    /// Number of times the action was invoked.
    pub attempts: u32,
}

impl StepRecord {
    fn pending(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            status: StepStatus::Pending,
            result: None,
            error: None,
            compensation_error: None,
            attempts: 0,
        }
    }
}

/// One run of a [`Saga`].
///
/// Serializes to `{id, saga_name, status, steps, started_at, completed_at,
/// failed_step, error}`.
#[derive(Debug, Clone, Serialize)]
pub struct SagaExecution {
    /// Execution identifier.
    pub id: Uuid,
    /// Name of the saga being run.
    pub saga_name: String,
    /// Overall status.
    pub status: SagaStatus,
    /// Status log, one entry per step in declaration order.
    pub steps: Vec<StepRecord>,
    /// When `run` started.
    pub started_at: Option<DateTime<Utc>>,
    /// When `run` finished.
    pub completed_at: Option<DateTime<Utc>>,
    /// Name of the step whose action failed.
    pub failed_step: Option<String>,
    /// Message of the action failure.
    pub error: Option<String>,
    #[serde(skip)]
    saga: Arc<Saga>,
    #[serde(skip)]
    config: SagaConfig,
}

impl SagaExecution {
    /// Creates a pending execution of `saga`.
    #[must_use]
    pub fn new(saga: Arc<Saga>, config: &SagaConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            saga_name: saga.name().to_owned(),
            status: SagaStatus::Pending,
            steps: saga
                .steps()
                .iter()
                .map(|step| StepRecord::pending(step.name()))
                .collect(),
            started_at: None,
            completed_at: None,
            failed_step: None,
            error: None,
            saga,
            config: config.clone(),
        }
    }

    /// Returns `true` once every step completed.
    #[must_use]
    pub fn success(&self) -> bool {
        self.status == SagaStatus::Completed
    }

    /// Wall-clock duration of the run, once finished.
    #[must_use]
    pub fn duration_ms(&self) -> Option<i64> {
        Some((self.completed_at? - self.started_at?).num_milliseconds())
    }

    /// Status record of the named step.
    #[must_use]
    pub fn step(&self, name: &str) -> Option<&StepRecord> {
        self.steps.iter().find(|record| record.name == name)
    }

    /// Runs every step in order against `context`.
    ///
    /// When an action fails, the steps completed so far are compensated in
    /// reverse completion order; a failing compensation is recorded on its
    /// step and the cascade continues. Panics inside an action or a
    /// compensation are caught and treated as failures.
    ///
    /// # Errors
    ///
    /// Returns a [`StepFailure`] naming the failing step and carrying the
    /// action's error, after compensation finished.
    #[instrument(skip_all, fields(saga = %self.saga_name, execution_id = %self.id))]
    pub async fn run(
        &mut self,
        context: &mut SagaContext,
        clock: &dyn Clock,
    ) -> Result<(), StepFailure> {
        let saga = Arc::clone(&self.saga);
        self.status = SagaStatus::Running;
        self.started_at = Some(clock.now());
        if self.config.enable_logging {
            info!(steps = saga.step_count(), "saga started");
        }

        let mut completed: Vec<usize> = Vec::with_capacity(saga.step_count());
        for (index, step) in saga.steps().iter().enumerate() {
            self.steps[index].status = StepStatus::Running;
            debug!(step = step.name(), "step started");

            let max_retries = step.max_retries().unwrap_or(self.config.max_retries);
            let mut attempt = 0;
            let outcome = loop {
                attempt += 1;
                let outcome = invoke(&step.action, context, step.timeout()).await;
                match outcome {
                    Err(e) if attempt <= max_retries => {
                        warn!(step = step.name(), attempt, error = %e, "step failed, retrying");
                        tokio::time::sleep(self.config.retry_delay()).await;
                    }
                    outcome => break outcome,
                }
            };
            self.steps[index].attempts = attempt;

            match outcome {
                Ok(value) => {
                    let record = &mut self.steps[index];
                    record.status = StepStatus::Completed;
                    record.result = Some(value);
                    completed.push(index);
                    debug!(step = step.name(), "step completed");
                }
                Err(source) => {
                    let message = source.to_string();
                    warn!(step = step.name(), error = %message, "step failed, compensating");
                    let record = &mut self.steps[index];
                    record.status = StepStatus::Failed;
                    record.error = Some(message.clone());

                    self.compensate(&completed, context).await;

                    self.status = SagaStatus::Failed;
                    self.completed_at = Some(clock.now());
                    self.failed_step = Some(step.name().to_owned());
                    self.error = Some(message);
                    if self.config.enable_logging {
                        info!(failed_step = step.name(), "saga failed");
                    }
                    return Err(StepFailure {
                        step_name: step.name().to_owned(),
                        source,
                    });
                }
            }
        }

        self.status = SagaStatus::Completed;
        self.completed_at = Some(clock.now());
        if self.config.enable_logging {
            info!("saga completed");
        }
        Ok(())
    }

    async fn compensate(&mut self, completed: &[usize], context: &mut SagaContext) {
        let saga = Arc::clone(&self.saga);
        for &index in completed.iter().rev() {
            let step = &saga.steps()[index];
            let record = &mut self.steps[index];
            let Some(compensation) = &step.compensation else {
                record.status = StepStatus::Compensated;
                continue;
            };

            record.status = StepStatus::Compensating;
            match invoke(compensation, context, None).await {
                Ok(_) => {
                    self.steps[index].status = StepStatus::Compensated;
                    debug!(step = step.name(), "step compensated");
                }
                Err(e) => {
                    warn!(step = step.name(), error = %e, "compensation failed");
                    let record = &mut self.steps[index];
                    record.status = StepStatus::Failed;
                    record.compensation_error = Some(e.to_string());
                }
            }
        }
    }
}

/// Runs one action or compensation attempt, converting a timeout or a
/// panic into a step error.
async fn invoke(
    f: &StepFn,
    context: &mut SagaContext,
    timeout: Option<Duration>,
) -> Result<Value, StepError> {
    let guarded = AssertUnwindSafe(async move { f(context).await }).catch_unwind();
    let outcome = match timeout {
        Some(limit) => match tokio::time::timeout(limit, guarded).await {
            Ok(outcome) => outcome,
            Err(_) => return Err(format!("timed out after {}ms", limit.as_millis()).into()),
        },
        None => guarded.await,
    };
    outcome.unwrap_or_else(|panic| Err(panic_message(panic.as_ref()).into()))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("step panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("step panicked: {message}")
    } else {
        "step panicked".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::SagaStep;
    use futures::FutureExt;
    use keel_test_support::{FixedClock, StepLog};
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn recorded(log: &StepLog, label: &'static str) -> SagaStep {
        let action_log = log.clone();
        let compensation_log = log.clone();
        SagaStep::new(label, move |_ctx| {
            let log = action_log.clone();
            async move {
                log.record(label);
                Ok(Value::Null)
            }
            .boxed()
        })
        .with_compensation(move |_ctx| {
            let log = compensation_log.clone();
            async move {
                log.record(format!("{label}_comp"));
                Ok(Value::Null)
            }
            .boxed()
        })
    }

    fn failing(log: &StepLog, label: &'static str) -> SagaStep {
        let log = log.clone();
        SagaStep::new(label, move |_ctx| {
            let log = log.clone();
            async move {
                log.record(label);
                Err::<Value, StepError>(format!("{label} exploded").into())
            }
            .boxed()
        })
    }

    fn execution(saga: Saga) -> SagaExecution {
        SagaExecution::new(Arc::new(saga), &SagaConfig::default())
    }

    #[tokio::test]
    async fn test_all_steps_complete() {
        // Arrange
        let log = StepLog::new();
        let saga = Saga::new("happy")
            .step(recorded(&log, "step1"))
            .step(recorded(&log, "step2"));
        let mut execution = execution(saga);
        let mut context = SagaContext::new();

        // Act
        let result = execution.run(&mut context, &FixedClock::at_default()).await;

        // Assert
        assert!(result.is_ok());
        assert!(execution.success());
        assert_eq!(log.entries(), ["step1", "step2"]);
        assert!(
            execution
                .steps
                .iter()
                .all(|s| s.status == StepStatus::Completed && s.attempts == 1)
        );
        assert_eq!(execution.duration_ms(), Some(0));
    }

    #[tokio::test]
    async fn test_failure_compensates_completed_steps_in_reverse() {
        // Arrange
        let log = StepLog::new();
        let saga = Saga::new("rollback")
            .step(recorded(&log, "s1"))
            .step(recorded(&log, "s2"))
            .step(recorded(&log, "s3"))
            .step(failing(&log, "s4"))
            .step(recorded(&log, "s5"));
        let mut execution = execution(saga);
        let mut context = SagaContext::new();

        // Act
        let failure = execution
            .run(&mut context, &FixedClock::at_default())
            .await
            .unwrap_err();

        // Assert
        assert_eq!(failure.step_name, "s4");
        assert_eq!(failure.source.to_string(), "s4 exploded");
        assert_eq!(
            log.entries(),
            ["s1", "s2", "s3", "s4", "s3_comp", "s2_comp", "s1_comp"]
        );
        assert_eq!(execution.status, SagaStatus::Failed);
        assert_eq!(execution.failed_step.as_deref(), Some("s4"));
        assert_eq!(execution.step("s4").unwrap().status, StepStatus::Failed);
        assert_eq!(execution.step("s5").unwrap().status, StepStatus::Pending);
        for name in ["s1", "s2", "s3"] {
            assert_eq!(
                execution.step(name).unwrap().status,
                StepStatus::Compensated
            );
        }
    }

    #[tokio::test]
    async fn test_first_step_failure_compensates_nothing() {
        // Arrange
        let log = StepLog::new();
        let saga = Saga::new("early")
            .step(failing(&log, "s1"))
            .step(recorded(&log, "s2"));
        let mut execution = execution(saga);

        // Act
        let result = execution
            .run(&mut SagaContext::new(), &FixedClock::at_default())
            .await;

        // Assert
        assert!(result.is_err());
        assert_eq!(log.entries(), ["s1"]);
    }

    #[tokio::test]
    async fn test_compensation_failure_does_not_stop_cascade() {
        // Arrange
        let log = StepLog::new();
        let stubborn = SagaStep::new("s2", |_ctx| async { Ok(Value::Null) }.boxed())
            .with_compensation(|_ctx| {
                async { Err::<Value, StepError>("refund gateway down".into()) }.boxed()
            });
        let saga = Saga::new("stubborn")
            .step(recorded(&log, "s1"))
            .step(stubborn)
            .step(failing(&log, "s3"));
        let mut execution = execution(saga);

        // Act
        let failure = execution
            .run(&mut SagaContext::new(), &FixedClock::at_default())
            .await
            .unwrap_err();

        // Assert
        assert_eq!(failure.step_name, "s3");
        let s2 = execution.step("s2").unwrap();
        assert_eq!(s2.status, StepStatus::Failed);
        assert_eq!(s2.compensation_error.as_deref(), Some("refund gateway down"));
        assert_eq!(
            execution.step("s1").unwrap().status,
            StepStatus::Compensated
        );
        assert!(log.entries().contains(&"s1_comp".to_owned()));
        assert_eq!(execution.error.as_deref(), Some("s3 exploded"));
    }

    #[tokio::test]
    async fn test_step_without_compensation_is_marked_compensated() {
        // Arrange
        let log = StepLog::new();
        let plain = SagaStep::new("notify", |_ctx| async { Ok(json!("sent")) }.boxed());
        let saga = Saga::new("plain").step(plain).step(failing(&log, "s2"));
        let mut execution = execution(saga);

        // Act
        let _ = execution
            .run(&mut SagaContext::new(), &FixedClock::at_default())
            .await;

        // Assert
        let notify = execution.step("notify").unwrap();
        assert_eq!(notify.status, StepStatus::Compensated);
        assert_eq!(notify.result, Some(json!("sent")));
    }

    #[tokio::test]
    async fn test_steps_share_the_context() {
        // Arrange
        let writer = SagaStep::new("reserve", |ctx| {
            async move {
                ctx.insert("reservation_id".to_owned(), json!("res-1"));
                Ok(Value::Null)
            }
            .boxed()
        });
        let reader = SagaStep::new("charge", |ctx| {
            async move {
                let reservation = ctx
                    .get("reservation_id")
                    .cloned()
                    .ok_or_else(|| StepError::from("missing reservation"))?;
                ctx.insert("charged_for".to_owned(), reservation);
                Ok::<_, StepError>(Value::Null)
            }
            .boxed()
        });
        let mut execution = execution(Saga::new("ctx").step(writer).step(reader));
        let mut context = SagaContext::new();

        // Act
        execution
            .run(&mut context, &FixedClock::at_default())
            .await
            .unwrap();

        // Assert
        assert_eq!(context["charged_for"], json!("res-1"));
    }

    async fn explode() -> Result<Value, StepError> {
        panic!("kaboom")
    }

    #[tokio::test]
    async fn test_panicking_action_is_a_step_failure() {
        // Arrange
        let log = StepLog::new();
        let panicking = SagaStep::new("boom", |_ctx| explode().boxed());
        let saga = Saga::new("panic")
            .step(recorded(&log, "s1"))
            .step(panicking);
        let mut execution = execution(saga);

        // Act
        let failure = execution
            .run(&mut SagaContext::new(), &FixedClock::at_default())
            .await
            .unwrap_err();

        // Assert
        assert_eq!(failure.step_name, "boom");
        assert!(failure.source.to_string().contains("kaboom"));
        assert_eq!(log.entries(), ["s1", "s1_comp"]);
    }

    #[tokio::test]
    async fn test_retries_before_compensating() {
        // Arrange
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&attempts);
        let flaky = SagaStep::new("flaky", move |_ctx| {
            let counter = Arc::clone(&counter);
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err::<Value, StepError>("try again".into())
                } else {
                    Ok(json!("done"))
                }
            }
            .boxed()
        })
        .with_max_retries(2);
        let config = SagaConfig::default().with_retry_delay_ms(0);
        let mut execution = SagaExecution::new(Arc::new(Saga::new("retry").step(flaky)), &config);

        // Act
        let result = execution
            .run(&mut SagaContext::new(), &FixedClock::at_default())
            .await;

        // Assert
        assert!(result.is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        assert_eq!(execution.step("flaky").unwrap().attempts, 3);
    }

    #[tokio::test]
    async fn test_retries_are_exhausted_then_fail() {
        // Arrange
        let log = StepLog::new();
        let config = SagaConfig::default()
            .with_max_retries(1)
            .with_retry_delay_ms(0);
        let saga = Saga::new("exhaust").step(failing(&log, "s1"));
        let mut execution = SagaExecution::new(Arc::new(saga), &config);

        // Act
        let result = execution
            .run(&mut SagaContext::new(), &FixedClock::at_default())
            .await;

        // Assert
        assert!(result.is_err());
        assert_eq!(log.entries(), ["s1", "s1"]);
        assert_eq!(execution.step("s1").unwrap().attempts, 2);
    }

    #[tokio::test]
    async fn test_step_timeout_fails_the_step() {
        // Arrange
        let slow = SagaStep::new("slow", |_ctx| {
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(Value::Null)
            }
            .boxed()
        })
        .with_timeout(Duration::from_millis(10));
        let mut execution = execution(Saga::new("timeout").step(slow));

        // Act
        let failure = execution
            .run(&mut SagaContext::new(), &FixedClock::at_default())
            .await
            .unwrap_err();

        // Assert
        assert_eq!(failure.source.to_string(), "timed out after 10ms");
        assert_eq!(execution.status, SagaStatus::Failed);
    }

    #[test]
    fn test_execution_wire_shape() {
        // Arrange
        let log = StepLog::new();
        let execution = execution(Saga::new("wire").step(recorded(&log, "s1")));

        // Act
        let wire = serde_json::to_value(&execution).unwrap();

        // Assert
        assert_eq!(wire["saga_name"], json!("wire"));
        assert_eq!(wire["status"], json!("pending"));
        assert_eq!(wire["steps"][0]["status"], json!("pending"));
        assert!(wire.get("saga").is_none());
        assert!(wire.get("config").is_none());
    }
}
