//! Simulated assembly task.
//!
//! Models factory work: each lesson in the worker's snapshot shaves time off
//! the job, a worker occasionally discovers a new optimization, and a canary
//! carrying experimental knowledge may be carrying a bad lesson that ruins
//! its work.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{DirectorError, Result};
use crate::worker::{Task, TaskReport, WorkContext};

/// Lessons a simulated worker can discover.
pub fn default_lesson_catalog() -> Vec<String> {
    [
        "Pre-sort parts before welding → saves 18 seconds",
        "Use 0.3mm offset on curved panels",
        "Pause 200ms after torque → reduces defects",
        "Stage hinges on the left rail before door hang",
        "Recalibrate the seal roller every 40 panels",
        "Approach weld seams from the inside edge first",
        "Seat the window regulator before the trim clips",
        "Check torque wrench zero at shift start",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Tuning for SimulatedTask.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Job duration with no lessons (ms)
    pub base_duration_ms: u64,
    /// Time saved per lesson in the snapshot (ms)
    pub saving_per_lesson_ms: u64,
    /// Floor on job duration (ms)
    pub min_duration_ms: u64,
    /// Chance a worker surfaces a lesson candidate
    pub discovery_probability: f64,
    /// Workers holding this many lessons or more stop discovering
    pub max_lessons_for_discovery: usize,
    /// Chance of a defect with only validated knowledge
    pub base_defect_probability: f64,
    /// Chance an experimental canary carries the bad lesson (and is defective)
    pub bad_lesson_probability: f64,
    /// Lessons available for discovery
    pub catalog: Vec<String>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            base_duration_ms: 300,
            saving_per_lesson_ms: 20,
            min_duration_ms: 5,
            discovery_probability: 0.02,
            max_lessons_for_discovery: 8,
            base_defect_probability: 0.01,
            bad_lesson_probability: 0.7,
            catalog: default_lesson_catalog(),
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, p) in [
            ("discovery_probability", self.discovery_probability),
            ("base_defect_probability", self.base_defect_probability),
            ("bad_lesson_probability", self.bad_lesson_probability),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(DirectorError::InvalidConfig(format!(
                    "simulation.{} must be within [0, 1], got {}",
                    name, p
                )));
            }
        }
        Ok(())
    }

    /// No sleeping; useful for fast runs and tests.
    pub fn instant(mut self) -> Self {
        self.base_duration_ms = 0;
        self.saving_per_lesson_ms = 0;
        self.min_duration_ms = 0;
        self
    }
}

/// Randomized factory work.
#[derive(Debug, Clone)]
pub struct SimulatedTask {
    description: String,
    config: SimulationConfig,
}

impl SimulatedTask {
    pub fn new(description: impl Into<String>, config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            description: description.into(),
            config,
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Job duration for a worker holding `lessons` lessons.
    pub fn duration_for(&self, lessons: usize) -> Duration {
        let saved = self.config.saving_per_lesson_ms.saturating_mul(lessons as u64);
        let ms = self
            .config
            .base_duration_ms
            .saturating_sub(saved)
            .max(self.config.min_duration_ms);
        Duration::from_millis(ms)
    }

    fn discover(&self, ctx: &mut WorkContext) -> Option<String> {
        if ctx.lessons.len() >= self.config.max_lessons_for_discovery {
            return None;
        }
        if !ctx.rng.random_bool(self.config.discovery_probability) {
            return None;
        }
        let unknown: Vec<&String> = self
            .config
            .catalog
            .iter()
            .filter(|c| !ctx.lessons.contains(c))
            .collect();
        if unknown.is_empty() {
            return None;
        }
        let pick = ctx.rng.random_range(0..unknown.len());
        Some(unknown[pick].clone())
    }
}

#[async_trait]
impl Task for SimulatedTask {
    fn describe(&self) -> &str {
        &self.description
    }

    async fn perform(&self, ctx: &mut WorkContext) -> Result<TaskReport> {
        let duration = self.duration_for(ctx.lessons.len());
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }

        let has_bad_lesson = ctx.carries_experimental && ctx.rng.random_bool(self.config.bad_lesson_probability);
        let defect = has_bad_lesson || ctx.rng.random_bool(self.config.base_defect_probability);
        let lesson = if defect { None } else { self.discover(ctx) };

        Ok(TaskReport { lesson, defect })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn ctx(lessons: usize, carries_experimental: bool, seed: u64) -> WorkContext {
        WorkContext {
            worker_id: "w".to_string(),
            shift_number: 1,
            lessons: (0..lessons).map(|i| format!("known {}", i)).collect(),
            is_canary: carries_experimental,
            carries_experimental,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn instant(config: SimulationConfig) -> SimulatedTask {
        SimulatedTask::new("assemble doors", config.instant()).unwrap()
    }

    #[test]
    fn test_duration_decreases_with_lessons() {
        let task = SimulatedTask::new("assemble doors", SimulationConfig::default()).unwrap();
        assert_eq!(task.duration_for(0), Duration::from_millis(300));
        assert_eq!(task.duration_for(5), Duration::from_millis(200));
        let mut prev = task.duration_for(0);
        for n in 1..30 {
            let d = task.duration_for(n);
            assert!(d <= prev);
            prev = d;
        }
        assert_eq!(task.duration_for(1000), Duration::from_millis(5));
    }

    #[test]
    fn test_invalid_probability_rejected() {
        let config = SimulationConfig {
            bad_lesson_probability: 1.5,
            ..Default::default()
        };
        let err = SimulatedTask::new("x", config).unwrap_err();
        assert!(matches!(err, DirectorError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn test_experimental_canary_with_certain_bad_lesson_is_defective() {
        let task = instant(SimulationConfig {
            bad_lesson_probability: 1.0,
            base_defect_probability: 0.0,
            ..Default::default()
        });
        let report = task.perform(&mut ctx(0, true, 1)).await.unwrap();
        assert!(report.defect);
        assert!(report.lesson.is_none());

        let report = task.perform(&mut ctx(0, false, 1)).await.unwrap();
        assert!(!report.defect);
    }

    #[tokio::test]
    async fn test_certain_discovery_picks_unknown_catalog_lesson() {
        let task = instant(SimulationConfig {
            discovery_probability: 1.0,
            base_defect_probability: 0.0,
            catalog: vec!["known 0".to_string(), "fresh".to_string()],
            ..Default::default()
        });
        let report = task.perform(&mut ctx(1, false, 3)).await.unwrap();
        assert_eq!(report.lesson.as_deref(), Some("fresh"));
    }

    #[tokio::test]
    async fn test_no_discovery_past_lesson_cap() {
        let task = instant(SimulationConfig {
            discovery_probability: 1.0,
            base_defect_probability: 0.0,
            ..Default::default()
        });
        let report = task.perform(&mut ctx(8, false, 3)).await.unwrap();
        assert!(report.lesson.is_none());
    }

    #[tokio::test]
    async fn test_same_seed_same_report() {
        let task = instant(SimulationConfig {
            discovery_probability: 0.5,
            base_defect_probability: 0.3,
            ..Default::default()
        });
        for seed in 0..20 {
            let a = task.perform(&mut ctx(2, false, seed)).await.unwrap();
            let b = task.perform(&mut ctx(2, false, seed)).await.unwrap();
            assert_eq!(a, b);
        }
    }
}
