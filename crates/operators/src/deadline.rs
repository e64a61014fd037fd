//! Decision-deadline model
//!
//! `deadline(speed) = baseline - (speed - reference_speed) * sensitivity`
//!
//! The affine model is not clamped. Values outside `[0, max_plausible_ms]` are
//! passed through unchanged and flagged for calibration review.

use contracts::{DeadlineConfig, Obstacle, VehiclePose};
use tracing::warn;

/// Why an estimate needs calibration review
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationFlag {
    /// Speed far enough above the reference to drive the budget below zero
    Negative,
    /// Budget above the configured plausible maximum
    AbovePlausible,
}

/// One deadline estimate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeadlineEstimate {
    pub deadline_ms: f64,
    pub flag: Option<CalibrationFlag>,
}

impl DeadlineEstimate {
    pub fn is_flagged(&self) -> bool {
        self.flag.is_some()
    }
}

/// 决策时限模型
#[derive(Debug, Clone)]
pub struct DeadlineModel {
    config: DeadlineConfig,
}

impl Default for DeadlineModel {
    fn default() -> Self {
        Self::new(DeadlineConfig::default())
    }
}

impl DeadlineModel {
    pub fn new(config: DeadlineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DeadlineConfig {
        &self.config
    }

    /// Raw model value in milliseconds for a forward speed in m/s
    pub fn estimate(&self, forward_speed: f64) -> f64 {
        self.config.baseline_ms
            - (forward_speed - self.config.reference_speed_mps) * self.config.sensitivity_ms_per_mps
    }

    /// Model value plus calibration flag; flagged values are logged, not altered
    pub fn assess(&self, forward_speed: f64) -> DeadlineEstimate {
        let deadline_ms = self.estimate(forward_speed);
        let flag = if deadline_ms < 0.0 {
            Some(CalibrationFlag::Negative)
        } else if deadline_ms > self.config.max_plausible_ms {
            Some(CalibrationFlag::AbovePlausible)
        } else {
            None
        };

        if let Some(flag) = flag {
            warn!(
                forward_speed,
                deadline_ms,
                flag = ?flag,
                "Deadline estimate outside calibrated range"
            );
        }

        DeadlineEstimate { deadline_ms, flag }
    }

    /// Estimate for a pose with optional obstacle context.
    ///
    /// Only the forward speed is used; `obstacles` is accepted so callers can
    /// already pass it.
    // TODO: shorten the budget by distance to the nearest located obstacle once
    // a calibrated proximity term exists.
    pub fn estimate_with_context(
        &self,
        pose: &VehiclePose,
        _obstacles: Option<&[Obstacle]>,
    ) -> DeadlineEstimate {
        self.assess(pose.forward_speed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_points() {
        let model = DeadlineModel::default();
        assert_eq!(model.estimate(10.0), 400.0);
        assert_eq!(model.estimate(20.0), 300.0);
        assert_eq!(model.estimate(0.0), 500.0);
    }

    #[test]
    fn test_monotone_non_increasing() {
        let model = DeadlineModel::default();
        let speeds: Vec<f64> = (0..=100).map(|s| s as f64 * 0.75).collect();
        assert!(speeds
            .windows(2)
            .all(|w| model.estimate(w[1]) <= model.estimate(w[0])));
    }

    #[test]
    fn test_flags_without_clamping() {
        let model = DeadlineModel::default();

        let fast = model.assess(60.0);
        assert_eq!(fast.deadline_ms, -100.0);
        assert_eq!(fast.flag, Some(CalibrationFlag::Negative));

        let normal = model.assess(15.0);
        assert_eq!(normal.deadline_ms, 350.0);
        assert!(!normal.is_flagged());

        let model = DeadlineModel::new(DeadlineConfig {
            max_plausible_ms: 450.0,
            ..DeadlineConfig::default()
        });
        let slow = model.assess(0.0);
        assert_eq!(slow.deadline_ms, 500.0);
        assert_eq!(slow.flag, Some(CalibrationFlag::AbovePlausible));
    }

    #[test]
    fn test_context_ignores_obstacles() {
        let model = DeadlineModel::default();
        let pose = VehiclePose {
            forward_speed: 20.0,
            ..Default::default()
        };
        let obstacles = vec![Obstacle::new(1, "vehicle", 0.9)];

        let with = model.estimate_with_context(&pose, Some(&obstacles));
        let without = model.estimate_with_context(&pose, None);
        assert_eq!(with, without);
        assert_eq!(with.deadline_ms, 300.0);
    }
}
