//! Director module
//!
//! The persistent identity. Owns the lesson store and rollback controller
//! for the life of the process, runs shifts through the scheduler and
//! applies each shift's batch in one aggregation step.

mod report;
mod supervisor;

pub use report::{DirectorSnapshot, Mood, ShiftReport};
pub use supervisor::{Director, DirectorConfig};
