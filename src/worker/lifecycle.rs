//! Worker lifecycle: spawn -> execute -> terminate.
//!
//! A worker owns a by-value copy of the lessons it was spawned with, so it
//! never observes lesson store changes made after spawn. Terminating a
//! worker consumes it; only the Outcome survives.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::id::generate_worker_id;
use crate::worker::{Outcome, Task, WorkContext, WorkerFailure};

/// Placement of a worker within its shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSlot {
    /// Shift the worker belongs to
    pub shift_number: u64,
    /// Position within the shift (0-based)
    pub index: usize,
    /// Whether this slot is a canary
    pub is_canary: bool,
    /// Whether the worker carries experimental knowledge
    pub carries_experimental: bool,
    /// Seed for the worker's private randomness
    pub seed: u64,
}

impl WorkerSlot {
    pub fn new(shift_number: u64, index: usize, is_canary: bool) -> Self {
        Self {
            shift_number,
            index,
            is_canary,
            carries_experimental: false,
            seed: index as u64,
        }
    }

    pub fn with_experimental(mut self, carries_experimental: bool) -> Self {
        self.carries_experimental = carries_experimental;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// An ephemeral execution unit. Disposed after one task.
pub struct Worker {
    id: String,
    slot: WorkerSlot,
    task: Arc<dyn Task>,
    lessons_snapshot: Vec<String>,
    outcome: Option<Outcome>,
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("slot", &self.slot)
            .field("task", &self.task.describe())
            .field("lessons_snapshot", &self.lessons_snapshot)
            .field("outcome", &self.outcome)
            .finish()
    }
}

impl Worker {
    /// Spawn a worker with a fresh ID and its own copy of the lessons.
    pub fn spawn(task: Arc<dyn Task>, lessons_snapshot: Vec<String>, slot: WorkerSlot) -> Self {
        let id = generate_worker_id(slot.shift_number, slot.index, slot.seed);
        tracing::trace!(
            worker_id = %id,
            canary = slot.is_canary,
            lessons = lessons_snapshot.len(),
            task = task.describe(),
            "Worker spawned"
        );
        Self {
            id,
            slot,
            task,
            lessons_snapshot,
            outcome: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_canary(&self) -> bool {
        self.slot.is_canary
    }

    pub fn slot(&self) -> WorkerSlot {
        self.slot
    }

    pub fn lessons_snapshot(&self) -> &[String] {
        &self.lessons_snapshot
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        self.outcome.as_ref()
    }

    /// Run the task once and attach its Outcome.
    ///
    /// Errors, panics and deadline overruns become a defect with no lesson;
    /// nothing escapes this call. A worker that already has an Outcome is
    /// not run again.
    pub async fn execute(&mut self, deadline: Duration) {
        if self.outcome.is_some() {
            return;
        }

        let mut ctx = WorkContext {
            worker_id: self.id.clone(),
            shift_number: self.slot.shift_number,
            lessons: self.lessons_snapshot.clone(),
            is_canary: self.slot.is_canary,
            carries_experimental: self.slot.carries_experimental,
            rng: StdRng::seed_from_u64(self.slot.seed),
        };

        let started = Instant::now();
        let run = AssertUnwindSafe(self.task.perform(&mut ctx)).catch_unwind();
        let result = tokio::time::timeout(deadline, run).await;
        let elapsed = started.elapsed();

        let failure = match result {
            Ok(Ok(Ok(report))) => {
                self.outcome = Some(Outcome::completed(
                    self.id.clone(),
                    self.slot.shift_number,
                    self.slot.is_canary,
                    report.lesson,
                    report.defect,
                    elapsed,
                ));
                return;
            }
            Ok(Ok(Err(e))) => WorkerFailure::Error(e.to_string()),
            Ok(Err(payload)) => WorkerFailure::Panicked(panic_message(payload)),
            Err(_) => WorkerFailure::Timeout(deadline),
        };

        tracing::warn!(worker_id = %self.id, failure = %failure, "Worker task failed");
        self.outcome = Some(Outcome::failed(
            self.id.clone(),
            self.slot.shift_number,
            self.slot.is_canary,
            failure,
            elapsed,
        ));
    }

    /// Dispose of the worker, returning its Outcome.
    ///
    /// The lessons snapshot and all other worker state are dropped here. A
    /// worker terminated before executing reports a failed Outcome.
    pub fn terminate(self) -> Outcome {
        let Worker {
            id, slot, outcome, ..
        } = self;
        tracing::trace!(worker_id = %id, "Worker terminated, memory wiped");
        outcome.unwrap_or_else(|| {
            Outcome::failed(
                id,
                slot.shift_number,
                slot.is_canary,
                WorkerFailure::Error("terminated before executing".to_string()),
                Duration::ZERO,
            )
        })
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
