//! Director implementation
//!
//! The Director is constructed once per process and mutated only between
//! shifts. `run_shift` takes `&mut self`, so a shift can never overlap
//! another shift or a toggle.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::director::{DirectorSnapshot, Mood, ShiftReport};
use crate::error::Result;
use crate::knowledge::{KnowledgeConfig, LessonStore};
use crate::rollback::{RollbackConfig, RollbackController, RollbackEvent, ShiftSample};
use crate::scheduler::{SchedulerConfig, ShiftBatch, ShiftPlan, ShiftScheduler, ShiftSetup};
use crate::worker::Task;

/// Configuration for the Director.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectorConfig {
    /// Display name of the persistent identity
    pub name: String,
    /// Seed for all worker randomness; None draws from the OS
    pub seed: Option<u64>,
    pub knowledge: KnowledgeConfig,
    pub scheduler: SchedulerConfig,
    pub rollback: RollbackConfig,
}

impl Default for DirectorConfig {
    fn default() -> Self {
        Self {
            name: "Director-01".to_string(),
            seed: None,
            knowledge: KnowledgeConfig::default(),
            scheduler: SchedulerConfig::default(),
            rollback: RollbackConfig::default(),
        }
    }
}

impl DirectorConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_knowledge(mut self, knowledge: KnowledgeConfig) -> Self {
        self.knowledge = knowledge;
        self
    }

    pub fn with_scheduler(mut self, scheduler: SchedulerConfig) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn with_rollback(mut self, rollback: RollbackConfig) -> Self {
        self.rollback = rollback;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.knowledge.validate()?;
        self.scheduler.validate()?;
        self.rollback.validate()
    }
}

/// Persistent coordinator supervising ephemeral workers.
#[derive(Debug)]
pub struct Director {
    name: String,
    lessons: LessonStore,
    controller: RollbackController,
    scheduler: ShiftScheduler,
    shift_count: u64,
    mood: Mood,
    total_workers_terminated: u64,
    rng: StdRng,
}

impl Director {
    /// Bring the director online. Rejects invalid configuration.
    pub fn new(config: DirectorConfig) -> Result<Self> {
        config.validate()?;

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        tracing::info!(name = %config.name, seed = ?config.seed, "Director online - persistent identity");

        Ok(Self {
            name: config.name,
            lessons: LessonStore::new(&config.knowledge),
            controller: RollbackController::new(config.rollback),
            scheduler: ShiftScheduler::new(config.scheduler),
            shift_count: 0,
            mood: Mood::default(),
            total_workers_terminated: 0,
            rng,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shift_count(&self) -> u64 {
        self.shift_count
    }

    pub fn mood(&self) -> Mood {
        self.mood
    }

    pub fn defect_rate_ema(&self) -> f64 {
        self.controller.defect_rate_ema()
    }

    pub fn experimental_enabled(&self) -> bool {
        self.controller.experimental_enabled()
    }

    pub fn lessons(&self) -> &LessonStore {
        &self.lessons
    }

    pub fn rollbacks(&self) -> &[RollbackEvent] {
        self.controller.rollbacks()
    }

    /// Run one shift of `worker_count` disposable workers.
    ///
    /// An invalid plan is rejected before anything changes. Otherwise the
    /// shift number is consumed, every worker runs against the same lesson
    /// snapshot, and the whole batch is applied in one step.
    pub async fn run_shift(
        &mut self,
        worker_count: usize,
        task: Arc<dyn Task>,
        canary_ratio: f64,
    ) -> Result<ShiftReport> {
        let plan = ShiftPlan::new(worker_count, canary_ratio);
        plan.validate()?;

        self.shift_count += 1;
        let setup = ShiftSetup {
            shift_number: self.shift_count,
            plan,
            snapshot: self.lessons.active(),
            experimental_enabled: self.controller.experimental_enabled(),
            seed: self.rng.random(),
        };

        let result = self.scheduler.run_shift(task, setup).await;
        Ok(self.aggregate(self.shift_count, result))
    }

    /// Manually enable or disable experimental knowledge.
    ///
    /// Returns whether the gate changed.
    pub fn toggle_experimental(&mut self, enabled: bool) -> bool {
        let changed = self.controller.set_experimental(enabled);
        if changed {
            tracing::info!(name = %self.name, shift = self.shift_count, experimental = enabled, "Manual toggle");
        }
        changed
    }

    pub fn snapshot(&self) -> DirectorSnapshot {
        DirectorSnapshot {
            name: self.name.clone(),
            shift_count: self.shift_count,
            mood: self.mood,
            defect_rate_ema: self.controller.defect_rate_ema(),
            experimental_enabled: self.controller.experimental_enabled(),
            active_lessons: self.lessons.active(),
            total_lessons: self.lessons.len(),
            total_workers_terminated: self.total_workers_terminated,
            rollback_count: self.controller.rollbacks().len(),
        }
    }

    /// Apply a shift's batch to director state, or nothing at all if the
    /// batch could not be collected.
    fn aggregate(&mut self, shift_number: u64, result: Result<ShiftBatch>) -> ShiftReport {
        let batch = match result {
            Ok(batch) => batch,
            Err(e) => {
                tracing::error!(shift = shift_number, error = %e, "Shift aborted, no state applied");
                return ShiftReport::aborted(
                    shift_number,
                    self.controller.defect_rate_ema(),
                    self.controller.experimental_enabled(),
                    self.mood,
                    e.to_string(),
                );
            }
        };

        let verdict = self.controller.observe(shift_number, ShiftSample::from(&batch));

        let total_candidates = batch.candidates().count();
        let mut committed_lessons = Vec::new();
        let mut considered = 0;
        if verdict.commit_allowed {
            for candidate in batch.validated_candidates() {
                considered += 1;
                if self.lessons.add(candidate) {
                    tracing::info!(shift = shift_number, lesson = candidate, "Lesson committed");
                    committed_lessons.push(candidate.to_string());
                }
            }
        }
        let candidates_discarded = total_candidates - considered;
        if candidates_discarded > 0 {
            tracing::debug!(
                shift = shift_number,
                discarded = candidates_discarded,
                gate_open = verdict.commit_allowed,
                "Lesson candidates discarded"
            );
        }

        self.total_workers_terminated += batch.completed() as u64;
        let rollback_triggered = verdict.rollback.is_some();
        self.mood = Mood::assess(
            verdict.defect_rate_ema,
            self.controller.config().threshold,
            rollback_triggered,
        );

        ShiftReport {
            shift_number,
            completed: batch.completed(),
            defects: batch.defects(),
            canaries: batch.canaries(),
            canary_defects: batch.canary_defects(),
            timed_out: batch.timed_out(),
            current_defect_rate: verdict.current_defect_rate,
            new_lessons_committed: committed_lessons.len(),
            committed_lessons,
            candidates_discarded,
            defect_rate_ema: verdict.defect_rate_ema,
            experimental_enabled: self.controller.experimental_enabled(),
            rollback_triggered,
            rollback: verdict.rollback,
            mood: self.mood,
            aborted: false,
            fault: None,
        }
    }
}
