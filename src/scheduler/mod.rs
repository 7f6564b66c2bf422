//! Shift scheduler module.
//!
//! Runs one shift of disposable workers behind a barrier:
//! 1. Flags the first `floor(worker_count * canary_ratio)` workers as canaries
//! 2. Spawns every worker from the same lesson snapshot
//! 3. Executes all workers concurrently, each under its own deadline
//! 4. Waits for every Outcome and returns them as one batch
//!
//! The scheduler never touches director state; aggregation happens after
//! the batch is returned.

mod shift;

pub use shift::{SchedulerConfig, ShiftBatch, ShiftPlan, ShiftScheduler, ShiftSetup};
