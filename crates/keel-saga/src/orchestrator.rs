//! Saga registry, execution and bounded history.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use keel_core::clock::{SharedClock, SystemClock};
use serde::Serialize;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::config::SagaConfig;
use crate::error::SagaError;
use crate::execution::SagaExecution;
use crate::saga::Saga;
use crate::status::{SagaStatus, StepStatus};
use crate::step::SagaContext;

/// Aggregate counters over every execution the orchestrator ran.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SagaStats {
    /// Executions run, including those already evicted from history.
    pub total_executions: u64,
    /// Executions where every step completed.
    pub completed: u64,
    /// Executions that failed.
    pub failed: u64,
    /// Steps rolled back by a successful compensation.
    pub compensated: u64,
    /// Mean run duration in milliseconds.
    pub avg_duration_ms: f64,
}

#[derive(Debug, Default)]
struct Totals {
    executions: u64,
    completed: u64,
    failed: u64,
    compensated: u64,
    duration_ms: i64,
}

/// Registry of saga definitions plus the history of their executions.
///
/// History is a ring buffer bounded by [`SagaConfig::history_limit`]; the
/// oldest execution is evicted first.
pub struct SagaOrchestrator {
    config: SagaConfig,
    clock: SharedClock,
    sagas: RwLock<HashMap<String, Arc<Saga>>>,
    history: Mutex<VecDeque<SagaExecution>>,
    totals: Mutex<Totals>,
}

impl SagaOrchestrator {
    /// Creates an orchestrator with no registered sagas.
    #[must_use]
    pub fn new(config: SagaConfig, clock: SharedClock) -> Self {
        Self {
            config,
            clock,
            sagas: RwLock::new(HashMap::new()),
            history: Mutex::new(VecDeque::new()),
            totals: Mutex::new(Totals::default()),
        }
    }

    /// Registers `saga` under its name, replacing any earlier definition.
    pub fn register(&self, saga: Saga) {
        let name = saga.name().to_owned();
        let steps = saga.step_count();
        let replaced = self
            .sagas
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.clone(), Arc::new(saga))
            .is_some();
        info!(saga = %name, steps, replaced, "saga registered");
    }

    /// Runs the saga registered as `name` against `context`.
    ///
    /// The finished execution is retained in history whatever its outcome.
    ///
    /// # Errors
    ///
    /// Returns `SagaError::UnknownSaga` if nothing is registered under
    /// `name`, and `SagaError::StepFailed` (carrying the finished
    /// execution) if a step failed.
    #[instrument(skip(self, context))]
    pub async fn execute(
        &self,
        name: &str,
        context: &mut SagaContext,
    ) -> Result<SagaExecution, SagaError> {
        let saga = self
            .sagas
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| SagaError::UnknownSaga(name.to_owned()))?;

        let mut execution = SagaExecution::new(saga, &self.config);
        let outcome = execution.run(context, self.clock.as_ref()).await;
        self.record(&execution);

        match outcome {
            Ok(()) => Ok(execution),
            Err(failure) => Err(SagaError::StepFailed {
                step_name: failure.step_name,
                source: failure.source,
                execution: Box::new(execution),
            }),
        }
    }

    /// Looks up a retained execution.
    #[must_use]
    pub fn get_execution(&self, id: Uuid) -> Option<SagaExecution> {
        self.history()
            .iter()
            .find(|execution| execution.id == id)
            .cloned()
    }

    /// Retained executions, oldest first.
    #[must_use]
    pub fn list_executions(&self) -> Vec<SagaExecution> {
        self.history().iter().cloned().collect()
    }

    /// Number of retained executions.
    #[must_use]
    pub fn execution_count(&self) -> usize {
        self.history().len()
    }

    /// Number of registered sagas.
    #[must_use]
    pub fn saga_count(&self) -> usize {
        self.sagas
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if a saga is registered under `name`.
    #[must_use]
    pub fn has_saga(&self, name: &str) -> bool {
        self.sagas
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Counters over every execution run so far.
    #[must_use]
    pub fn stats(&self) -> SagaStats {
        let totals = self.totals.lock().unwrap_or_else(PoisonError::into_inner);
        #[allow(clippy::cast_precision_loss)]
        let avg_duration_ms = if totals.executions == 0 {
            0.0
        } else {
            totals.duration_ms as f64 / totals.executions as f64
        };
        SagaStats {
            total_executions: totals.executions,
            completed: totals.completed,
            failed: totals.failed,
            compensated: totals.compensated,
            avg_duration_ms,
        }
    }

    /// Returns the orchestrator configuration.
    #[must_use]
    pub fn config(&self) -> &SagaConfig {
        &self.config
    }

    fn history(&self) -> MutexGuard<'_, VecDeque<SagaExecution>> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, execution: &SagaExecution) {
        {
            let mut totals = self.totals.lock().unwrap_or_else(PoisonError::into_inner);
            totals.executions += 1;
            match execution.status {
                SagaStatus::Completed => totals.completed += 1,
                SagaStatus::Failed => totals.failed += 1,
                SagaStatus::Pending | SagaStatus::Running => {}
            }
            totals.compensated += execution
                .steps
                .iter()
                .filter(|step| step.status == StepStatus::Compensated)
                .count() as u64;
            totals.duration_ms += execution.duration_ms().unwrap_or(0);
        }

        if self.config.history_limit == 0 {
            return;
        }
        let mut history = self.history();
        while history.len() >= self.config.history_limit {
            if let Some(evicted) = history.pop_front() {
                debug!(execution_id = %evicted.id, "evicted execution from history");
            }
        }
        history.push_back(execution.clone());
    }
}

impl Default for SagaOrchestrator {
    fn default() -> Self {
        Self::new(SagaConfig::default(), Arc::new(SystemClock))
    }
}

impl fmt::Debug for SagaOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sagas = self.sagas.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<&str> = sagas.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("SagaOrchestrator")
            .field("sagas", &names)
            .field("executions", &self.execution_count())
            .finish_non_exhaustive()
    }
}
