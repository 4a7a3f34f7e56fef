//! Step and execution state machines.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of one step within an execution.
///
/// `Pending → Running → {Completed | Failed}`; a completed step that has
/// to be undone moves `Completed → Compensating → {Compensated | Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Not started.
    Pending,
    /// Action in progress.
    Running,
    /// Action succeeded.
    Completed,
    /// Action or compensation failed.
    Failed,
    /// Compensation in progress.
    Compensating,
    /// Compensation succeeded, or there was nothing to undo.
    Compensated,
}

impl StepStatus {
    /// Returns the lowercase wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Compensating => "compensating",
            Self::Compensated => "compensated",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overall state of an execution. Terminal once `run` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SagaStatus {
    /// Created, not yet run.
    Pending,
    /// Steps or compensations in progress.
    Running,
    /// Every step completed.
    Completed,
    /// A step failed; completed steps were compensated.
    Failed,
}

impl SagaStatus {
    /// Returns the lowercase wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Returns `true` for `Completed` and `Failed`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for SagaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
