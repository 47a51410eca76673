//! Outlier-rejecting weight estimation.
//!
//! One attempt draws `samples` raw reads, rejects the set when the readings
//! disagree by more than `max_spread_kg`, otherwise converts the mean with the
//! current calibration and applies the plausibility policy. Up to
//! `max_attempts` attempts are made. A spread rejection retries at once; an
//! implausible weight retries after `retry_delay`.
//!
//! The attempt loop is an explicit state machine (`EstimationCycle`) so the
//! event loop can wait out `retry_delay` without blocking radio events.
//! `WeightEstimator::estimate` drives the same machine to completion with a
//! `Clock`, for callers that can block.

use std::time::Duration;

use blescale_config::Configuration;
use blescale_traits::{Clock, LoadCell};

use crate::error::NodeError;
use crate::hw_error::map_hw_error;

/// Raw reads per attempt.
pub const NUMBER_OF_SAMPLES: usize = 5;
/// Attempts per estimation before giving up.
pub const MAX_NUMBER_OF_RETRIES: u32 = 3;
/// Largest allowed disagreement between the samples of one attempt (kg).
pub const MAX_ALLOWED_ERROR_KG: f64 = 1.0;
pub const MIN_ALLOWED_WEIGHT_KG: f64 = 5.0;
pub const MAX_ALLOWED_WEIGHT_KG: f64 = 30.0;
/// Wait before retrying after an implausible weight.
pub const RETRY_DELAY: Duration = Duration::from_secs(1);

/// Linear conversion: kg = (raw - offset) / scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pub offset: f64,
    pub scale: f64,
}

impl Calibration {
    #[inline]
    pub fn to_kg(&self, raw: f64) -> f64 {
        (raw - self.offset) / self.scale
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            offset: 0.0,
            scale: 1.0,
        }
    }
}

impl From<&Configuration> for Calibration {
    fn from(c: &Configuration) -> Self {
        Self {
            offset: c.offset,
            scale: c.scale,
        }
    }
}

/// How a converted weight is judged plausible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlausibilityPolicy {
    /// `w > min || w < max`. With min < max this accepts every number and
    /// only rejects NaN. Deployed nodes behave this way, so it is the default.
    #[default]
    Permissive,
    /// `min <= w <= max`.
    Range,
}

impl PlausibilityPolicy {
    pub fn accepts(self, weight_kg: f64, min_kg: f64, max_kg: f64) -> bool {
        match self {
            PlausibilityPolicy::Permissive => weight_kg > min_kg || weight_kg < max_kg,
            PlausibilityPolicy::Range => (min_kg..=max_kg).contains(&weight_kg),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EstimatorCfg {
    pub samples: usize,
    pub max_attempts: u32,
    pub max_spread_kg: f64,
    pub min_weight_kg: f64,
    pub max_weight_kg: f64,
    pub policy: PlausibilityPolicy,
    pub retry_delay: Duration,
}

impl Default for EstimatorCfg {
    fn default() -> Self {
        Self {
            samples: NUMBER_OF_SAMPLES,
            max_attempts: MAX_NUMBER_OF_RETRIES,
            max_spread_kg: MAX_ALLOWED_ERROR_KG,
            min_weight_kg: MIN_ALLOWED_WEIGHT_KG,
            max_weight_kg: MAX_ALLOWED_WEIGHT_KG,
            policy: PlausibilityPolicy::Permissive,
            retry_delay: RETRY_DELAY,
        }
    }
}

impl EstimatorCfg {
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.samples == 0 {
            return Err("samples must be >= 1");
        }
        if self.max_attempts == 0 {
            return Err("max_attempts must be >= 1");
        }
        if self.max_spread_kg.is_nan() || self.max_spread_kg < 0.0 {
            return Err("max_spread_kg must be >= 0");
        }
        Ok(())
    }
}

/// Outcome of advancing an `EstimationCycle`.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Accepted weight in kilograms.
    Ready(f64),
    /// Call `advance` again once this much time has passed.
    RetryAfter(Duration),
    Failed(NodeError),
}

/// Resumable attempt loop of one estimation.
#[derive(Debug, Clone, Default)]
pub struct EstimationCycle {
    attempt: u32,
}

impl EstimationCycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempts made so far.
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    /// Run attempts until one is accepted, a delayed retry is needed, or the
    /// budget is spent.
    pub fn advance<L: LoadCell + ?Sized>(
        &mut self,
        cell: &mut L,
        calibration: &Calibration,
        cfg: &EstimatorCfg,
    ) -> Step {
        while self.attempt < cfg.max_attempts {
            self.attempt += 1;
            let attempt = self.attempt;

            let (min_raw, max_raw, mean_raw) = match draw(cell, cfg.samples) {
                Ok(stats) => stats,
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "sensor read failed");
                    return Step::Failed(e);
                }
            };

            let spread_kg = (max_raw - min_raw) / calibration.scale.abs();
            if spread_kg.is_nan() || spread_kg > cfg.max_spread_kg {
                tracing::warn!(attempt, spread_kg, min_raw, max_raw, "samples disagree; retrying");
                continue;
            }

            let weight_kg = calibration.to_kg(mean_raw);
            if cfg
                .policy
                .accepts(weight_kg, cfg.min_weight_kg, cfg.max_weight_kg)
            {
                tracing::debug!(attempt, weight_kg, spread_kg, "weight accepted");
                return Step::Ready(weight_kg);
            }

            tracing::warn!(attempt, weight_kg, "implausible weight");
            if self.attempt < cfg.max_attempts {
                return Step::RetryAfter(cfg.retry_delay);
            }
        }
        Step::Failed(NodeError::NoStableReading {
            attempts: self.attempt,
        })
    }
}

/// Draw `n` raw samples; returns (min, max, mean).
fn draw<L: LoadCell + ?Sized>(cell: &mut L, n: usize) -> Result<(f64, f64, f64), NodeError> {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut sum = 0.0;
    for _ in 0..n {
        let raw = cell.read().map_err(|e| map_hw_error(e.as_ref()))?;
        tracing::trace!(raw, "load cell sample");
        min = min.min(raw);
        max = max.max(raw);
        sum += raw;
    }
    #[allow(clippy::cast_precision_loss)]
    let mean = sum / n as f64;
    Ok((min, max, mean))
}

/// Estimation parameters plus the live calibration.
#[derive(Debug, Clone, Default)]
pub struct WeightEstimator {
    cfg: EstimatorCfg,
    calibration: Calibration,
}

impl WeightEstimator {
    pub fn new(cfg: EstimatorCfg, calibration: Calibration) -> Self {
        Self { cfg, calibration }
    }

    pub fn cfg(&self) -> &EstimatorCfg {
        &self.cfg
    }

    pub fn calibration(&self) -> Calibration {
        self.calibration
    }

    pub fn set_offset(&mut self, offset: f64) {
        self.calibration.offset = offset;
    }

    pub fn set_scale(&mut self, scale: f64) {
        self.calibration.scale = scale;
    }

    /// Advance a cycle with this estimator's parameters.
    pub fn advance<L: LoadCell + ?Sized>(&self, cycle: &mut EstimationCycle, cell: &mut L) -> Step {
        cycle.advance(cell, &self.calibration, &self.cfg)
    }

    /// Blocking estimate: retry delays are spent in `clock.sleep`.
    pub fn estimate<L, C>(&self, cell: &mut L, clock: &C) -> Result<f64, NodeError>
    where
        L: LoadCell + ?Sized,
        C: Clock + ?Sized,
    {
        let mut cycle = EstimationCycle::new();
        loop {
            match self.advance(&mut cycle, cell) {
                Step::Ready(w) => return Ok(w),
                Step::RetryAfter(d) => clock.sleep(d),
                Step::Failed(e) => return Err(e),
            }
        }
    }
}
