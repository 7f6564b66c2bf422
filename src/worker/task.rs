//! Task seam - the opaque work a worker performs.

use async_trait::async_trait;
use rand::rngs::StdRng;

use crate::error::Result;

/// Everything a worker hands to its task. Owned by exactly one worker.
#[derive(Debug)]
pub struct WorkContext {
    /// Worker executing the task
    pub worker_id: String,
    /// Shift the worker belongs to
    pub shift_number: u64,
    /// Lessons captured at spawn time, oldest first
    pub lessons: Vec<String>,
    /// Whether the worker is a canary
    pub is_canary: bool,
    /// Whether the worker carries experimental (unvalidated) knowledge
    pub carries_experimental: bool,
    /// Per-worker randomness, seeded by the director
    pub rng: StdRng,
}

/// What a task reports back on normal completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskReport {
    /// At most one newly discovered lesson candidate
    pub lesson: Option<String>,
    /// Whether the produced work is defective
    pub defect: bool,
}

impl TaskReport {
    pub fn clean() -> Self {
        Self::default()
    }

    pub fn defective() -> Self {
        Self {
            lesson: None,
            defect: true,
        }
    }

    pub fn with_lesson(mut self, lesson: impl Into<String>) -> Self {
        self.lesson = Some(lesson.into());
        self
    }
}

/// Opaque work executed by a worker.
///
/// Implementations must be stateless across workers: everything a single
/// execution needs arrives in the WorkContext.
///
/// `perform` runs on the async worker pool and the worker deadline only
/// fires at `.await` points. It must not block the thread; synchronous or
/// CPU-heavy work goes through `tokio::task::spawn_blocking`, otherwise a
/// stuck task stalls the whole shift.
#[async_trait]
pub trait Task: Send + Sync {
    /// Short human-readable description of the work
    fn describe(&self) -> &str;

    /// Perform the work once.
    ///
    /// Errors are captured by the worker and reported as a defect.
    async fn perform(&self, ctx: &mut WorkContext) -> Result<TaskReport>;
}
