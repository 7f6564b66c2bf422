//! Rollback event record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::generate_event_id;

/// Emitted when the controller automatically disables experimental knowledge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RollbackEvent {
    /// Unique event identifier
    pub id: String,
    /// Shift whose aggregation triggered the rollback
    pub shift_number: u64,
    /// Smoothed defect rate at the time of rollback
    pub defect_rate_ema: f64,
    /// Threshold that was exceeded
    pub threshold: f64,
    pub at: DateTime<Utc>,
}

impl RollbackEvent {
    pub fn new(shift_number: u64, defect_rate_ema: f64, threshold: f64) -> Self {
        Self {
            id: generate_event_id("rbk"),
            shift_number,
            defect_rate_ema,
            threshold,
            at: Utc::now(),
        }
    }
}
