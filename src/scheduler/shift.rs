//! Shift execution with barrier semantics.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::error::{DirectorError, Result};
use crate::worker::{Outcome, Task, Worker, WorkerFailure, WorkerSlot};

/// Configuration for the ShiftScheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Per-worker deadline (ms). Overrunning workers count as defects.
    pub worker_timeout_ms: u64,
    /// Maximum workers executing at once within a shift.
    pub max_parallel_workers: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_timeout_ms: 2000,
            max_parallel_workers: 256,
        }
    }
}

impl SchedulerConfig {
    pub fn with_worker_timeout(mut self, timeout: Duration) -> Self {
        self.worker_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_max_parallel_workers(mut self, max: usize) -> Self {
        self.max_parallel_workers = max;
        self
    }

    pub fn worker_timeout(&self) -> Duration {
        Duration::from_millis(self.worker_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.worker_timeout_ms == 0 {
            return Err(DirectorError::InvalidConfig(
                "scheduler.worker_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.max_parallel_workers == 0 {
            return Err(DirectorError::InvalidConfig(
                "scheduler.max_parallel_workers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Size and canary share of one shift.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShiftPlan {
    pub worker_count: usize,
    pub canary_ratio: f64,
}

impl ShiftPlan {
    pub fn new(worker_count: usize, canary_ratio: f64) -> Self {
        Self {
            worker_count,
            canary_ratio,
        }
    }

    /// Reject plans that must not start a shift.
    pub fn validate(&self) -> Result<()> {
        if self.worker_count == 0 {
            return Err(DirectorError::InvalidConfig(
                "worker_count must be greater than 0".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.canary_ratio) {
            return Err(DirectorError::InvalidConfig(format!(
                "canary_ratio must be within [0, 1], got {}",
                self.canary_ratio
            )));
        }
        Ok(())
    }

    /// `floor(worker_count * canary_ratio)`.
    pub fn canary_count(&self) -> usize {
        // Epsilon absorbs representation error, e.g. 100 * 0.29 = 28.999...
        let exact = self.worker_count as f64 * self.canary_ratio + 1e-9;
        (exact.floor() as usize).min(self.worker_count)
    }
}

/// Everything the scheduler needs from the director for one shift.
#[derive(Debug, Clone)]
pub struct ShiftSetup {
    /// Number this shift's outcomes are attributed to
    pub shift_number: u64,
    pub plan: ShiftPlan,
    /// Active lessons captured before any worker executes
    pub snapshot: Vec<String>,
    /// Whether canaries carry experimental knowledge this shift
    pub experimental_enabled: bool,
    /// Base seed; worker `i` uses `seed + i`
    pub seed: u64,
}

/// All outcomes of one shift, in worker spawn order.
#[derive(Debug, Clone)]
pub struct ShiftBatch {
    pub shift_number: u64,
    /// Lessons every worker in the shift was spawned with
    pub snapshot: Vec<String>,
    pub canary_count: usize,
    pub outcomes: Vec<Outcome>,
    pub elapsed: Duration,
}

impl ShiftBatch {
    pub fn completed(&self) -> usize {
        self.outcomes.len()
    }

    pub fn defects(&self) -> usize {
        self.outcomes.iter().filter(|o| o.defect).count()
    }

    pub fn canaries(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_canary).count()
    }

    pub fn canary_defects(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_canary && o.defect).count()
    }

    pub fn timed_out(&self) -> usize {
        self.outcomes.iter().filter(|o| o.timed_out()).count()
    }

    /// Lesson candidates from workers whose work was not defective.
    pub fn validated_candidates(&self) -> impl Iterator<Item = &str> {
        self.outcomes
            .iter()
            .filter(|o| !o.defect)
            .filter_map(|o| o.new_lesson.as_deref())
    }

    /// Lesson candidates from any worker.
    pub fn candidates(&self) -> impl Iterator<Item = &str> {
        self.outcomes.iter().filter_map(|o| o.new_lesson.as_deref())
    }
}

/// Spawns, runs and collects one shift of workers.
#[derive(Debug, Clone, Default)]
pub struct ShiftScheduler {
    config: SchedulerConfig,
}

impl ShiftScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Run one shift to completion.
    ///
    /// Returns `InvalidConfig` before spawning anything if the plan is
    /// invalid, and `Scheduling` if the outcome set cannot be collected
    /// intact. Individual worker failures never surface here; they are
    /// defects inside the batch.
    pub async fn run_shift(&self, task: Arc<dyn Task>, setup: ShiftSetup) -> Result<ShiftBatch> {
        setup.plan.validate()?;

        let ShiftSetup {
            shift_number,
            plan,
            snapshot,
            experimental_enabled,
            seed,
        } = setup;
        let canary_count = plan.canary_count();
        let deadline = self.config.worker_timeout();
        let permits = Arc::new(Semaphore::new(self.config.max_parallel_workers.min(Semaphore::MAX_PERMITS)));

        tracing::info!(
            shift = shift_number,
            workers = plan.worker_count,
            canaries = canary_count,
            lessons = snapshot.len(),
            experimental = experimental_enabled,
            task = task.describe(),
            "Spawning shift"
        );

        let started = Instant::now();
        let workers: Vec<Worker> = (0..plan.worker_count)
            .map(|index| {
                let is_canary = index < canary_count;
                let slot = WorkerSlot::new(shift_number, index, is_canary)
                    .with_experimental(is_canary && experimental_enabled)
                    .with_seed(seed.wrapping_add(index as u64));
                Worker::spawn(task.clone(), snapshot.clone(), slot)
            })
            .collect();

        let identities: Vec<(String, bool)> = workers
            .iter()
            .map(|w| (w.id().to_string(), w.is_canary()))
            .collect();

        let handles = workers.into_iter().map(|mut worker| {
            let permits = permits.clone();
            tokio::spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|e| DirectorError::Scheduling(format!("worker permit unavailable: {}", e)))?;
                worker.execute(deadline).await;
                Ok::<Outcome, DirectorError>(worker.terminate())
            })
        });

        // Barrier: every worker reports before anything is aggregated.
        let results = join_all(handles).await;

        let mut outcomes = Vec::with_capacity(results.len());
        for ((worker_id, is_canary), result) in identities.into_iter().zip(results) {
            match result {
                Ok(Ok(outcome)) => outcomes.push(outcome),
                Ok(Err(e)) => return Err(e),
                Err(join_err) if join_err.is_panic() => {
                    tracing::warn!(worker_id = %worker_id, "Worker task panicked outside its task");
                    outcomes.push(Outcome::failed(
                        worker_id,
                        shift_number,
                        is_canary,
                        WorkerFailure::Panicked("worker runtime task panicked".to_string()),
                        Duration::ZERO,
                    ));
                }
                Err(join_err) => {
                    return Err(DirectorError::Scheduling(format!(
                        "worker {} did not report: {}",
                        worker_id, join_err
                    )));
                }
            }
        }

        if outcomes.len() != plan.worker_count || outcomes.iter().any(|o| o.shift_number != shift_number) {
            return Err(DirectorError::Scheduling(format!(
                "shift {} collected {} of {} outcomes",
                shift_number,
                outcomes.len(),
                plan.worker_count
            )));
        }

        let batch = ShiftBatch {
            shift_number,
            snapshot,
            canary_count,
            outcomes,
            elapsed: started.elapsed(),
        };

        tracing::info!(
            shift = shift_number,
            completed = batch.completed(),
            defects = batch.defects(),
            canary_defects = batch.canary_defects(),
            timed_out = batch.timed_out(),
            elapsed_ms = batch.elapsed.as_millis() as u64,
            "Shift complete"
        );

        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker::{DefectScript, ScriptedTask};
    use std::collections::HashSet;

    fn setup(shift_number: u64, worker_count: usize, canary_ratio: f64) -> ShiftSetup {
        ShiftSetup {
            shift_number,
            plan: ShiftPlan::new(worker_count, canary_ratio),
            snapshot: vec!["a".to_string(), "b".to_string()],
            experimental_enabled: false,
            seed: 42,
        }
    }

    #[test]
    fn test_canary_count_floors() {
        assert_eq!(ShiftPlan::new(80, 0.1).canary_count(), 8);
        assert_eq!(ShiftPlan::new(120, 0.1).canary_count(), 12);
        assert_eq!(ShiftPlan::new(9, 0.5).canary_count(), 4);
        assert_eq!(ShiftPlan::new(100, 0.29).canary_count(), 29);
        assert_eq!(ShiftPlan::new(7, 0.0).canary_count(), 0);
        assert_eq!(ShiftPlan::new(7, 1.0).canary_count(), 7);
    }

    #[test]
    fn test_plan_validation() {
        assert!(ShiftPlan::new(1, 0.0).validate().is_ok());
        assert!(ShiftPlan::new(1, 1.0).validate().is_ok());
        assert!(matches!(
            ShiftPlan::new(0, 0.1).validate(),
            Err(DirectorError::InvalidConfig(_))
        ));
        assert!(ShiftPlan::new(10, -0.1).validate().is_err());
        assert!(ShiftPlan::new(10, 1.01).validate().is_err());
        assert!(ShiftPlan::new(10, f64::NAN).validate().is_err());
    }

    #[test]
    fn test_scheduler_config_validation() {
        assert!(SchedulerConfig::default().validate().is_ok());
        assert!(SchedulerConfig::default().with_max_parallel_workers(0).validate().is_err());
        assert!(SchedulerConfig::default()
            .with_worker_timeout(Duration::ZERO)
            .validate()
            .is_err());
    }

    #[tokio::test]
    async fn test_run_shift_rejects_invalid_plan() {
        let scheduler = ShiftScheduler::default();
        let err = scheduler
            .run_shift(Arc::new(ScriptedTask::new("t")), setup(1, 10, 2.0))
            .await
            .unwrap_err();
        assert!(matches!(err, DirectorError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn test_run_shift_collects_every_outcome_once() {
        let scheduler = ShiftScheduler::default();
        let batch = scheduler
            .run_shift(Arc::new(ScriptedTask::new("t")), setup(3, 80, 0.1))
            .await
            .unwrap();

        assert_eq!(batch.shift_number, 3);
        assert_eq!(batch.completed(), 80);
        assert_eq!(batch.canary_count, 8);
        assert_eq!(batch.canaries(), 8);
        assert!(batch.outcomes.iter().all(|o| o.shift_number == 3));

        let ids: HashSet<&str> = batch.outcomes.iter().map(|o| o.worker_id.as_str()).collect();
        assert_eq!(ids.len(), 80);
    }

    #[tokio::test]
    async fn test_first_workers_are_canaries() {
        let scheduler = ShiftScheduler::default();
        let batch = scheduler
            .run_shift(Arc::new(ScriptedTask::new("t")), setup(1, 10, 0.3))
            .await
            .unwrap();
        let flags: Vec<bool> = batch.outcomes.iter().map(|o| o.is_canary).collect();
        assert_eq!(flags, vec![true, true, true, false, false, false, false, false, false, false]);
    }

    #[tokio::test]
    async fn test_only_canaries_carry_experimental_knowledge() {
        let scheduler = ShiftScheduler::default();
        let task = Arc::new(ScriptedTask::new("t").with_defects(DefectScript::ExperimentalCanaries));

        let mut s = setup(1, 20, 0.25);
        s.experimental_enabled = true;
        let batch = scheduler.run_shift(task.clone(), s).await.unwrap();
        assert_eq!(batch.canary_defects(), 5);
        assert_eq!(batch.defects(), 5);

        let batch = scheduler.run_shift(task, setup(2, 20, 0.25)).await.unwrap();
        assert_eq!(batch.defects(), 0);
    }

    #[tokio::test]
    async fn test_workers_run_concurrently() {
        let scheduler = ShiftScheduler::default();
        let task = Arc::new(ScriptedTask::new("t").with_delay(Duration::from_millis(100)));
        let started = Instant::now();
        let batch = scheduler.run_shift(task, setup(1, 50, 0.1)).await.unwrap();
        assert_eq!(batch.completed(), 50);
        assert!(started.elapsed() < Duration::from_millis(2000));
    }

    #[tokio::test]
    async fn test_parallelism_is_bounded() {
        let scheduler = ShiftScheduler::new(SchedulerConfig::default().with_max_parallel_workers(1));
        let task = Arc::new(ScriptedTask::new("t").with_delay(Duration::from_millis(30)));
        let started = Instant::now();
        let batch = scheduler.run_shift(task, setup(1, 5, 0.0)).await.unwrap();
        assert_eq!(batch.completed(), 5);
        assert!(started.elapsed() >= Duration::from_millis(150));
    }

    #[tokio::test]
    async fn test_stuck_workers_time_out_without_blocking_shift() {
        let scheduler =
            ShiftScheduler::new(SchedulerConfig::default().with_worker_timeout(Duration::from_millis(50)));
        let task = Arc::new(ScriptedTask::new("t").with_delay(Duration::from_secs(30)));
        let started = Instant::now();
        let batch = scheduler.run_shift(task, setup(1, 10, 0.0)).await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(batch.timed_out(), 10);
        assert_eq!(batch.defects(), 10);
    }

    #[tokio::test]
    async fn test_failing_workers_do_not_abort_shift() {
        let scheduler = ShiftScheduler::default();
        let batch = scheduler
            .run_shift(Arc::new(ScriptedTask::new("t").panicking()), setup(1, 6, 0.5))
            .await
            .unwrap();
        assert_eq!(batch.completed(), 6);
        assert_eq!(batch.defects(), 6);
        assert_eq!(batch.candidates().count(), 0);
    }

    #[tokio::test]
    async fn test_validated_candidates_skip_defective_work() {
        let scheduler = ShiftScheduler::default();
        let task = Arc::new(
            ScriptedTask::new("t")
                .with_lesson("tip")
                .with_defects(DefectScript::Canaries),
        );
        let batch = scheduler.run_shift(task, setup(1, 10, 0.2)).await.unwrap();
        assert_eq!(batch.candidates().count(), 10);
        assert_eq!(batch.validated_candidates().count(), 8);
    }

    #[tokio::test]
    async fn test_batch_keeps_snapshot() {
        let scheduler = ShiftScheduler::default();
        let batch = scheduler
            .run_shift(Arc::new(ScriptedTask::new("t")), setup(1, 3, 0.0))
            .await
            .unwrap();
        assert_eq!(batch.snapshot, vec!["a".to_string(), "b".to_string()]);
    }
}
