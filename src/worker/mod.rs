//! Worker module
//!
//! Ephemeral execution units. A worker is spawned with a copy of the
//! director's active lessons, executes one task, reports an Outcome and is
//! terminated. Nothing a worker experiences outlives it except the Outcome.
//!
//! - Task: the seam for opaque work, plus its per-worker context
//! - Worker: spawn / execute / terminate lifecycle
//! - Outcome: the single report a worker produces
//! - SimulatedTask / ScriptedTask: stock task implementations

mod lifecycle;
mod outcome;
mod scripted;
mod simulated;
mod task;

pub use lifecycle::{Worker, WorkerSlot};
pub use outcome::{Outcome, WorkerFailure};
pub use scripted::{DefectScript, ScriptedTask};
pub use simulated::{SimulatedTask, SimulationConfig, default_lesson_catalog};
pub use task::{Task, TaskReport, WorkContext};
