//! Rollback controller module
//!
//! Watches canary outcomes through an exponentially weighted defect rate and
//! owns the experimental-knowledge gate. Rollback is automatic; rollout is
//! only ever a manual toggle.

mod controller;
mod event;

pub use controller::{RollbackConfig, RollbackController, ShiftSample, Verdict};
pub use event::RollbackEvent;
