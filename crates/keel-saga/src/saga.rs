//! Saga definitions.

use crate::step::SagaStep;

/// A named, ordered list of steps.
///
/// Definitions are immutable once registered; every execution runs against
/// its own shared reference and tracks step state separately.
#[derive(Debug, Clone)]
pub struct Saga {
    name: String,
    description: String,
    steps: Vec<SagaStep>,
}

impl Saga {
    /// Creates an empty saga.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            steps: Vec::new(),
        }
    }

    /// Sets a human-readable description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Appends a step.
    #[must_use]
    pub fn step(mut self, step: SagaStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Appends a step in place.
    pub fn add_step(&mut self, step: SagaStep) {
        self.steps.push(step);
    }

    /// Saga name, used as the registration key.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Description, empty if none was set.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Steps in declaration order.
    #[must_use]
    pub fn steps(&self) -> &[SagaStep] {
        &self.steps
    }

    /// Number of steps.
    #[must_use]
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }
}
