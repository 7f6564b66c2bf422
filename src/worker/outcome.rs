//! Worker outcome types.
//!
//! Each worker produces exactly one Outcome, consumed once by shift aggregation.

use std::time::Duration;

/// Why a worker did not finish its task normally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerFailure {
    /// Task exceeded the per-worker deadline
    Timeout(Duration),
    /// Task returned an error
    Error(String),
    /// Task panicked
    Panicked(String),
}

impl std::fmt::Display for WorkerFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerFailure::Timeout(d) => write!(f, "timed out after {:?}", d),
            WorkerFailure::Error(e) => write!(f, "error: {}", e),
            WorkerFailure::Panicked(msg) => write!(f, "panicked: {}", msg),
        }
    }
}

/// Result of one worker's task execution.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    /// Worker that produced this outcome
    pub worker_id: String,
    /// Shift the worker was spawned in
    pub shift_number: u64,
    /// Whether the worker was a canary
    pub is_canary: bool,
    /// Lesson candidate surfaced during execution, not yet committed
    pub new_lesson: Option<String>,
    /// Whether the work was defective
    pub defect: bool,
    /// Set when the task failed, timed out or panicked
    pub failure: Option<WorkerFailure>,
    /// Wall time spent executing
    pub elapsed: Duration,
}

impl Outcome {
    /// Outcome of a task that ran to completion.
    pub fn completed(
        worker_id: impl Into<String>,
        shift_number: u64,
        is_canary: bool,
        new_lesson: Option<String>,
        defect: bool,
        elapsed: Duration,
    ) -> Self {
        Self {
            worker_id: worker_id.into(),
            shift_number,
            is_canary,
            new_lesson,
            defect,
            failure: None,
            elapsed,
        }
    }

    /// Outcome of a task that failed. Always a defect, never a lesson.
    pub fn failed(
        worker_id: impl Into<String>,
        shift_number: u64,
        is_canary: bool,
        failure: WorkerFailure,
        elapsed: Duration,
    ) -> Self {
        Self {
            worker_id: worker_id.into(),
            shift_number,
            is_canary,
            new_lesson: None,
            defect: true,
            failure: Some(failure),
            elapsed,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.failure.is_some()
    }

    pub fn timed_out(&self) -> bool {
        matches!(self.failure, Some(WorkerFailure::Timeout(_)))
    }
}
