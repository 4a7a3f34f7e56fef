//! Shared call recorder for saga step tests.

use std::sync::{Arc, Mutex};

/// A cloneable, thread-safe log of labels. Saga step closures push a label
/// when they run so tests can assert the execution order of actions and
/// compensations.
#[derive(Debug, Clone, Default)]
pub struct StepLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl StepLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a label.
    pub fn record(&self, label: impl Into<String>) {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(label.into());
    }

    /// Returns a copy of every recorded label, in order.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }

    /// Returns the number of recorded labels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
