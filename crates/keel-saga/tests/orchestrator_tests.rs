//! Orchestrator-level behavior: registry, history and error surfacing.

use std::sync::Arc;

use futures::FutureExt;
use keel_saga::{
    Saga, SagaConfig, SagaContext, SagaError, SagaOrchestrator, SagaStatus, SagaStep, StepError,
    StepStatus,
};
use keel_test_support::{FixedClock, StepLog};
use serde_json::{Value, json};

fn orchestrator(config: SagaConfig) -> SagaOrchestrator {
    SagaOrchestrator::new(config, Arc::new(FixedClock::at_default()))
}

fn step(log: &StepLog, name: &'static str, fails: bool) -> SagaStep {
    let action_log = log.clone();
    let compensation_log = log.clone();
    SagaStep::new(name, move |ctx| {
        let log = action_log.clone();
        async move {
            log.record(format!("action:{name}"));
            if fails {
                return Err::<Value, StepError>(format!("{name} failed").into());
            }
            ctx.insert(format!("{name}_done"), json!(true));
            Ok(json!(name))
        }
        .boxed()
    })
    .with_compensation(move |_ctx| {
        let log = compensation_log.clone();
        async move {
            log.record(format!("compensate:{name}"));
            Ok(Value::Null)
        }
        .boxed()
    })
}

fn three_step_saga(log: &StepLog, failing_step: Option<&'static str>) -> Saga {
    ["step1", "step2", "step3"]
        .into_iter()
        .fold(Saga::new("three_steps"), |saga, name| {
            saga.step(step(log, name, failing_step == Some(name)))
        })
}

#[tokio::test]
async fn test_three_step_saga_with_failing_middle_step() {
    // Arrange
    let log = StepLog::new();
    let orchestrator = orchestrator(SagaConfig::default());
    orchestrator.register(three_step_saga(&log, Some("step2")));
    let mut context = SagaContext::new();

    // Act
    let error = orchestrator
        .execute("three_steps", &mut context)
        .await
        .unwrap_err();

    // Assert
    assert_eq!(
        log.entries(),
        ["action:step1", "action:step2", "compensate:step1"]
    );
    let SagaError::StepFailed {
        step_name,
        source,
        execution,
    } = error
    else {
        panic!("expected a step failure");
    };
    assert_eq!(step_name, "step2");
    assert_eq!(source.to_string(), "step2 failed");
    assert!(!execution.success());
    assert_eq!(execution.status, SagaStatus::Failed);
    assert_eq!(
        execution.step("step3").unwrap().status,
        StepStatus::Pending
    );
    assert_eq!(context.get("step1_done"), Some(&json!(true)));
}

#[tokio::test]
async fn test_successful_saga_is_returned_and_retained() {
    // Arrange
    let log = StepLog::new();
    let orchestrator = orchestrator(SagaConfig::default());
    orchestrator.register(three_step_saga(&log, None));
    let mut context = SagaContext::new();

    // Act
    let execution = orchestrator
        .execute("three_steps", &mut context)
        .await
        .unwrap();

    // Assert
    assert!(execution.success());
    assert_eq!(context.len(), 3);
    let retained = orchestrator.get_execution(execution.id).unwrap();
    assert_eq!(retained.status, SagaStatus::Completed);
    assert_eq!(retained.steps[2].result, Some(json!("step3")));
}

#[tokio::test]
async fn test_unknown_saga_is_a_distinct_error() {
    // Arrange
    let orchestrator = orchestrator(SagaConfig::default());

    // Act
    let error = orchestrator
        .execute("missing", &mut SagaContext::new())
        .await
        .unwrap_err();

    // Assert
    assert!(matches!(&error, SagaError::UnknownSaga(name) if name == "missing"));
    assert!(error.execution().is_none());
    assert_eq!(orchestrator.execution_count(), 0);
}

#[tokio::test]
async fn test_failed_execution_is_retained_in_history() {
    // Arrange
    let log = StepLog::new();
    let orchestrator = orchestrator(SagaConfig::default());
    orchestrator.register(three_step_saga(&log, Some("step1")));

    // Act
    let error = orchestrator
        .execute("three_steps", &mut SagaContext::new())
        .await
        .unwrap_err();

    // Assert
    let id = error.execution().unwrap().id;
    let retained = orchestrator.get_execution(id).unwrap();
    assert_eq!(retained.failed_step.as_deref(), Some("step1"));
    assert_eq!(error.step_name(), Some("step1"));
}

#[tokio::test]
async fn test_history_evicts_oldest_beyond_limit() {
    // Arrange
    let log = StepLog::new();
    let orchestrator = orchestrator(SagaConfig::default().with_history_limit(2));
    orchestrator.register(three_step_saga(&log, None));
    let mut ids = Vec::new();

    // Act
    for _ in 0..3 {
        let execution = orchestrator
            .execute("three_steps", &mut SagaContext::new())
            .await
            .unwrap();
        ids.push(execution.id);
    }

    // Assert
    assert_eq!(orchestrator.execution_count(), 2);
    assert!(orchestrator.get_execution(ids[0]).is_none());
    let listed: Vec<_> = orchestrator
        .list_executions()
        .iter()
        .map(|execution| execution.id)
        .collect();
    assert_eq!(listed, ids[1..]);
    assert_eq!(orchestrator.stats().total_executions, 3);
}

#[tokio::test]
async fn test_reregistration_replaces_definition() {
    // Arrange
    let log = StepLog::new();
    let orchestrator = orchestrator(SagaConfig::default());
    orchestrator.register(three_step_saga(&log, Some("step1")));
    orchestrator.register(three_step_saga(&log, None));

    // Act
    let result = orchestrator
        .execute("three_steps", &mut SagaContext::new())
        .await;

    // Assert
    assert!(result.is_ok());
    assert_eq!(orchestrator.saga_count(), 1);
    assert!(orchestrator.has_saga("three_steps"));
}

#[tokio::test]
async fn test_stats_track_outcomes() {
    // Arrange
    let log = StepLog::new();
    let orchestrator = orchestrator(SagaConfig::default());
    orchestrator.register(three_step_saga(&log, None));
    orchestrator.register(
        Saga::new("fails_last")
            .step(step(&log, "a", false))
            .step(step(&log, "b", false))
            .step(step(&log, "c", true)),
    );

    // Act
    orchestrator
        .execute("three_steps", &mut SagaContext::new())
        .await
        .unwrap();
    let _ = orchestrator
        .execute("fails_last", &mut SagaContext::new())
        .await;

    // Assert
    let stats = orchestrator.stats();
    assert_eq!(stats.total_executions, 2);
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.compensated, 2);
    assert!(stats.avg_duration_ms.abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_concurrent_executions_are_independent() {
    // Arrange
    let log = StepLog::new();
    let orchestrator = Arc::new(orchestrator(SagaConfig::default()));
    orchestrator.register(three_step_saga(&log, None));

    // Act
    let mut first = SagaContext::new();
    let mut second = SagaContext::new();
    let (a, b) = tokio::join!(
        orchestrator.execute("three_steps", &mut first),
        orchestrator.execute("three_steps", &mut second),
    );

    // Assert
    assert_ne!(a.unwrap().id, b.unwrap().id);
    assert_eq!(first, second);
    assert_eq!(orchestrator.execution_count(), 2);
}
