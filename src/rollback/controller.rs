//! Canary defect-rate tracking and the experimental gate.
//!
//! After every shift the controller:
//! 1. Adds the shift's outcomes to a sample pool
//! 2. Once the pool holds `min_sample` outcomes and at least one canary,
//!    computes the canary defect rate over the pool, folds it into the EMA
//!    and empties the pool
//! 3. Rolls back experimental knowledge if it is enabled and the EMA is
//!    above `threshold`
//!
//! Pools smaller than `min_sample` are too noisy to act on, and pools
//! without canaries say nothing about canary health; their outcomes wait
//! for later shifts. With `seed_on_first_sample`, a freshly enabled gate is
//! judged only once its first trusted rate has replaced the old EMA.

use serde::{Deserialize, Serialize};

use crate::error::{DirectorError, Result};
use crate::rollback::RollbackEvent;
use crate::scheduler::ShiftBatch;

/// Configuration for the RollbackController.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RollbackConfig {
    /// EMA smoothing factor, weight of the newest rate.
    pub alpha: f64,
    /// EMA above this triggers a rollback.
    pub threshold: f64,
    /// Outcomes required before a defect rate is trusted.
    pub min_sample: usize,
    /// Seed the EMA with the first trusted rate after a reset instead of
    /// blending it into the previous value.
    pub seed_on_first_sample: bool,
}

impl Default for RollbackConfig {
    fn default() -> Self {
        Self {
            alpha: 0.1,
            threshold: 0.12,
            min_sample: 20,
            seed_on_first_sample: true,
        }
    }
}

impl RollbackConfig {
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_min_sample(mut self, min_sample: usize) -> Self {
        self.min_sample = min_sample;
        self
    }

    pub fn with_seed_on_first_sample(mut self, seed: bool) -> Self {
        self.seed_on_first_sample = seed;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.alpha > 0.0 && self.alpha <= 1.0) {
            return Err(DirectorError::InvalidConfig(format!(
                "rollback.alpha must be within (0, 1], got {}",
                self.alpha
            )));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(DirectorError::InvalidConfig(format!(
                "rollback.threshold must be within [0, 1], got {}",
                self.threshold
            )));
        }
        Ok(())
    }
}

/// Outcome counts the controller needs from one shift.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShiftSample {
    pub outcomes: usize,
    pub canaries: usize,
    pub canary_defects: usize,
}

impl ShiftSample {
    pub fn new(outcomes: usize, canaries: usize, canary_defects: usize) -> Self {
        Self {
            outcomes,
            canaries,
            canary_defects: canary_defects.min(canaries),
        }
    }

    /// `canary_defects / max(1, canaries)`
    pub fn defect_rate(&self) -> f64 {
        self.canary_defects as f64 / self.canaries.max(1) as f64
    }

    fn absorb(&mut self, other: ShiftSample) {
        self.outcomes += other.outcomes;
        self.canaries += other.canaries;
        self.canary_defects += other.canary_defects;
    }
}

impl From<&ShiftBatch> for ShiftSample {
    fn from(batch: &ShiftBatch) -> Self {
        Self::new(batch.completed(), batch.canaries(), batch.canary_defects())
    }
}

/// What the controller decided after observing a shift.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    /// Rate folded into the EMA, or None if the sample was too small
    pub current_defect_rate: Option<f64>,
    pub defect_rate_ema: f64,
    /// Set when this shift triggered an automatic rollback
    pub rollback: Option<RollbackEvent>,
    /// Whether new lesson candidates may be committed
    pub commit_allowed: bool,
}

/// Tracks the smoothed canary defect rate and gates experimental knowledge.
#[derive(Debug, Clone)]
pub struct RollbackController {
    config: RollbackConfig,
    defect_rate_ema: f64,
    seeded: bool,
    experimental_enabled: bool,
    pool: ShiftSample,
    rollbacks: Vec<RollbackEvent>,
}

impl RollbackController {
    /// Create a controller with experimental knowledge disabled.
    pub fn new(config: RollbackConfig) -> Self {
        Self {
            config,
            defect_rate_ema: 0.0,
            seeded: false,
            experimental_enabled: false,
            pool: ShiftSample::default(),
            rollbacks: Vec::new(),
        }
    }

    pub fn config(&self) -> &RollbackConfig {
        &self.config
    }

    pub fn defect_rate_ema(&self) -> f64 {
        self.defect_rate_ema
    }

    pub fn experimental_enabled(&self) -> bool {
        self.experimental_enabled
    }

    /// Outcomes waiting for the sample gate.
    pub fn pending_sample(&self) -> ShiftSample {
        self.pool
    }

    pub fn rollbacks(&self) -> &[RollbackEvent] {
        &self.rollbacks
    }

    /// Manually enable or disable experimental knowledge.
    ///
    /// Enabling starts a fresh canary evaluation: pooled outcomes are
    /// dropped and the next trusted rate re-seeds the EMA. Returns whether
    /// the gate changed.
    pub fn set_experimental(&mut self, enabled: bool) -> bool {
        if self.experimental_enabled == enabled {
            return false;
        }
        self.experimental_enabled = enabled;
        if enabled {
            self.pool = ShiftSample::default();
            self.seeded = false;
        }
        tracing::info!(experimental = enabled, ema = self.defect_rate_ema, "Experimental knowledge toggled");
        true
    }

    /// Fold one shift's outcomes into the controller.
    pub fn observe(&mut self, shift_number: u64, sample: ShiftSample) -> Verdict {
        self.pool.absorb(sample);

        let current_defect_rate = if self.pool.outcomes >= self.config.min_sample && self.pool.canaries > 0 {
            let rate = self.pool.defect_rate();
            self.update_ema(rate);
            self.pool = ShiftSample::default();
            tracing::debug!(shift = shift_number, rate = rate, ema = self.defect_rate_ema, "Defect rate updated");
            Some(rate)
        } else {
            tracing::debug!(
                shift = shift_number,
                pooled = self.pool.outcomes,
                canaries = self.pool.canaries,
                min_sample = self.config.min_sample,
                "Sample too small or canary-free, defect rate not updated"
            );
            None
        };

        // A fresh evaluation has no EMA of its own until the first trusted rate
        let awaiting_seed = self.config.seed_on_first_sample && !self.seeded;
        let rollback = if self.experimental_enabled && !awaiting_seed && self.defect_rate_ema > self.config.threshold {
            self.experimental_enabled = false;
            let event = RollbackEvent::new(shift_number, self.defect_rate_ema, self.config.threshold);
            tracing::warn!(
                shift = shift_number,
                ema = self.defect_rate_ema,
                threshold = self.config.threshold,
                "AUTOMATIC ROLLBACK - defect rate too high"
            );
            self.rollbacks.push(event.clone());
            Some(event)
        } else {
            None
        };

        Verdict {
            current_defect_rate,
            defect_rate_ema: self.defect_rate_ema,
            rollback,
            commit_allowed: self.experimental_enabled,
        }
    }

    fn update_ema(&mut self, rate: f64) {
        let rate = rate.clamp(0.0, 1.0);
        self.defect_rate_ema = if self.config.seed_on_first_sample && !self.seeded {
            rate
        } else {
            self.defect_rate_ema * (1.0 - self.config.alpha) + rate * self.config.alpha
        };
        self.defect_rate_ema = self.defect_rate_ema.clamp(0.0, 1.0);
        self.seeded = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blending() -> RollbackController {
        RollbackController::new(RollbackConfig::default().with_seed_on_first_sample(false))
    }

    #[test]
    fn test_starts_disabled_with_zero_ema() {
        let c = RollbackController::new(RollbackConfig::default());
        assert!(!c.experimental_enabled());
        assert_eq!(c.defect_rate_ema(), 0.0);
        assert!(c.rollbacks().is_empty());
    }

    #[test]
    fn test_sample_defect_rate() {
        assert_eq!(ShiftSample::new(80, 8, 8).defect_rate(), 1.0);
        assert_eq!(ShiftSample::new(80, 8, 2).defect_rate(), 0.25);
        assert_eq!(ShiftSample::new(80, 0, 0).defect_rate(), 0.0);
        assert_eq!(ShiftSample::new(80, 2, 5).canary_defects, 2);
    }

    #[test]
    fn test_ema_blends_with_alpha() {
        let mut c = blending();
        let v = c.observe(1, ShiftSample::new(20, 10, 10));
        assert_eq!(v.current_defect_rate, Some(1.0));
        assert!((c.defect_rate_ema() - 0.1).abs() < 1e-12);
        c.observe(2, ShiftSample::new(20, 10, 10));
        assert!((c.defect_rate_ema() - 0.19).abs() < 1e-12);
    }

    #[test]
    fn test_first_trusted_rate_seeds_ema() {
        let mut c = RollbackController::new(RollbackConfig::default());
        c.observe(1, ShiftSample::new(40, 4, 1));
        assert!((c.defect_rate_ema() - 0.25).abs() < 1e-12);
        c.observe(2, ShiftSample::new(40, 4, 0));
        assert!((c.defect_rate_ema() - 0.225).abs() < 1e-12);
    }

    #[test]
    fn test_small_samples_pool_until_trusted() {
        let mut c = blending();
        let v = c.observe(1, ShiftSample::new(10, 5, 5));
        assert_eq!(v.current_defect_rate, None);
        assert_eq!(c.defect_rate_ema(), 0.0);
        assert_eq!(c.pending_sample().outcomes, 10);

        let v = c.observe(2, ShiftSample::new(10, 5, 0));
        assert_eq!(v.current_defect_rate, Some(0.5));
        assert_eq!(c.pending_sample(), ShiftSample::default());
    }

    #[test]
    fn test_ema_stays_in_bounds() {
        let mut c = blending();
        let rates = [1.0, 0.0, 1.0, 1.0, 0.5, 0.0, 1.0, 0.999, 0.001];
        for (i, r) in rates.iter().cycle().take(500).enumerate() {
            let canaries = 1000;
            let defects = (r * canaries as f64).round() as usize;
            c.observe(i as u64, ShiftSample::new(1000, canaries, defects));
            assert!((0.0..=1.0).contains(&c.defect_rate_ema()));
        }
    }

    #[test]
    fn test_rollback_within_three_failing_shifts() {
        let mut c = blending();
        c.set_experimental(true);
        let mut rolled_back_at = None;
        for shift in 1..=3 {
            let v = c.observe(shift, ShiftSample::new(20, 20, 20));
            if v.rollback.is_some() {
                rolled_back_at = Some(shift);
                break;
            }
        }
        assert_eq!(rolled_back_at, Some(2));
        assert!(c.defect_rate_ema() > 0.12);
        assert!(!c.experimental_enabled());
        assert_eq!(c.rollbacks().len(), 1);
    }

    #[test]
    fn test_rollback_only_when_enabled() {
        let mut c = RollbackController::new(RollbackConfig::default());
        let v = c.observe(1, ShiftSample::new(80, 8, 8));
        assert!(c.defect_rate_ema() > 0.12);
        assert!(v.rollback.is_none());
        assert!(!v.commit_allowed);
    }

    #[test]
    fn test_never_enables_itself() {
        let mut c = RollbackController::new(RollbackConfig::default());
        for shift in 0..200 {
            let defects = (shift % 9) as usize;
            c.observe(shift, ShiftSample::new(25, 8, defects));
            assert!(!c.experimental_enabled());
        }
    }

    #[test]
    fn test_commit_allowed_follows_gate() {
        let mut c = RollbackController::new(RollbackConfig::default());
        c.set_experimental(true);
        let v = c.observe(1, ShiftSample::new(80, 8, 0));
        assert!(v.commit_allowed);

        // Seeded at 0.0, then 0.1, then 0.19
        let v = c.observe(2, ShiftSample::new(80, 8, 8));
        assert!(v.rollback.is_none());
        assert!(v.commit_allowed);
        let v = c.observe(3, ShiftSample::new(80, 8, 8));
        assert!(v.rollback.is_some());
        assert!(!v.commit_allowed);
    }

    #[test]
    fn test_canary_free_pool_is_not_trusted() {
        let mut c = RollbackController::new(RollbackConfig::default());
        c.set_experimental(true);
        let v = c.observe(1, ShiftSample::new(30, 0, 0));
        assert_eq!(v.current_defect_rate, None);
        assert_eq!(c.pending_sample().outcomes, 30);

        // The seed is still available for the first canary evidence
        let v = c.observe(2, ShiftSample::new(80, 8, 8));
        assert_eq!(v.current_defect_rate, Some(1.0));
        assert_eq!(c.defect_rate_ema(), 1.0);
        assert!(v.rollback.is_some());
    }

    #[test]
    fn test_reenable_waits_for_first_trusted_rate() {
        let mut c = RollbackController::new(RollbackConfig::default());
        c.set_experimental(true);
        assert!(c.observe(1, ShiftSample::new(80, 8, 8)).rollback.is_some());
        assert_eq!(c.defect_rate_ema(), 1.0);

        c.set_experimental(true);
        let v = c.observe(2, ShiftSample::new(10, 5, 0));
        assert_eq!(v.current_defect_rate, None);
        assert!(v.rollback.is_none());
        assert!(c.experimental_enabled());

        let v = c.observe(3, ShiftSample::new(10, 5, 0));
        assert_eq!(v.current_defect_rate, Some(0.0));
        assert_eq!(v.defect_rate_ema, 0.0);
        assert!(v.rollback.is_none());
    }

    #[test]
    fn test_blending_checks_old_ema_after_reenable() {
        let mut c = blending();
        c.set_experimental(true);
        c.observe(1, ShiftSample::new(20, 20, 20));
        c.observe(2, ShiftSample::new(20, 20, 20));
        assert!(!c.experimental_enabled());

        c.set_experimental(true);
        let v = c.observe(3, ShiftSample::new(5, 5, 0));
        assert!(v.rollback.is_some());
    }

    #[test]
    fn test_enable_resets_evaluation() {
        let mut c = RollbackController::new(RollbackConfig::default());
        c.observe(1, ShiftSample::new(5, 5, 5));
        assert_eq!(c.pending_sample().outcomes, 5);

        assert!(c.set_experimental(true));
        assert_eq!(c.pending_sample(), ShiftSample::default());
        assert!(!c.set_experimental(true));
        assert!(c.set_experimental(false));
    }

    #[test]
    fn test_config_validate() {
        assert!(RollbackConfig::default().validate().is_ok());
        assert!(RollbackConfig::default().with_alpha(0.0).validate().is_err());
        assert!(RollbackConfig::default().with_alpha(1.5).validate().is_err());
        assert!(RollbackConfig::default().with_threshold(-0.1).validate().is_err());
        assert!(RollbackConfig::default().with_threshold(f64::NAN).validate().is_err());
    }
}
