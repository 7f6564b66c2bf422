//! Shift reports and director snapshots.

use serde::{Deserialize, Serialize};

use crate::rollback::RollbackEvent;

/// The director's disposition, recomputed after every shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    #[default]
    Relaxed,
    Watchful,
    Alarmed,
}

impl Mood {
    /// Alarmed on rollback or above threshold, watchful above two thirds of
    /// the threshold, relaxed otherwise.
    pub fn assess(defect_rate_ema: f64, threshold: f64, rollback_triggered: bool) -> Self {
        if rollback_triggered || defect_rate_ema > threshold {
            Mood::Alarmed
        } else if defect_rate_ema > threshold * 2.0 / 3.0 {
            Mood::Watchful
        } else {
            Mood::Relaxed
        }
    }
}

impl std::fmt::Display for Mood {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Mood::Relaxed => "relaxed",
            Mood::Watchful => "watchful",
            Mood::Alarmed => "alarmed",
        };
        write!(f, "{}", s)
    }
}

/// Result of one `Director::run_shift` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShiftReport {
    pub shift_number: u64,
    /// Workers that reported an outcome
    pub completed: usize,
    pub defects: usize,
    pub canaries: usize,
    pub canary_defects: usize,
    /// Workers stopped by the per-worker deadline
    pub timed_out: usize,
    /// Rate folded into the EMA; None when the sample gate held it back
    pub current_defect_rate: Option<f64>,
    pub new_lessons_committed: usize,
    pub committed_lessons: Vec<String>,
    /// Lesson candidates dropped by the gate or from defective work
    pub candidates_discarded: usize,
    pub defect_rate_ema: f64,
    pub experimental_enabled: bool,
    pub rollback_triggered: bool,
    pub rollback: Option<RollbackEvent>,
    pub mood: Mood,
    /// Outcome collection failed; nothing from this shift was applied
    pub aborted: bool,
    pub fault: Option<String>,
}

impl ShiftReport {
    /// Zero-progress report for a shift whose outcomes could not be collected.
    pub fn aborted(
        shift_number: u64,
        defect_rate_ema: f64,
        experimental_enabled: bool,
        mood: Mood,
        fault: impl Into<String>,
    ) -> Self {
        Self {
            shift_number,
            completed: 0,
            defects: 0,
            canaries: 0,
            canary_defects: 0,
            timed_out: 0,
            current_defect_rate: None,
            new_lessons_committed: 0,
            committed_lessons: Vec::new(),
            candidates_discarded: 0,
            defect_rate_ema,
            experimental_enabled,
            rollback_triggered: false,
            rollback: None,
            mood,
            aborted: true,
            fault: Some(fault.into()),
        }
    }
}

/// Point-in-time view of the director for observability and rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectorSnapshot {
    pub name: String,
    pub shift_count: u64,
    pub mood: Mood,
    pub defect_rate_ema: f64,
    pub experimental_enabled: bool,
    /// Lessons new workers receive, oldest first
    pub active_lessons: Vec<String>,
    pub total_lessons: usize,
    pub total_workers_terminated: u64,
    pub rollback_count: usize,
}
