//! Attention/load estimation from telemetry summaries and context signals.

use serde::{Deserialize, Serialize};

use crate::context::AttentionContext;
use crate::error::ConfigError;
use crate::telemetry::TelemetrySummary;

/// Soft caps and weights for the load model.
///
/// Each raw signal saturates at its cap (`min(1, value / cap)`) before
/// entering the weighted sum. Weights are normalized to sum to 1 when the
/// model is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttentionConfig {
    /// Keystrokes per minute at which typing alone saturates.
    pub keystroke_cap: f64,
    /// Pager events per minute at which paging saturates.
    pub pager_cap: f64,
    /// Queue depth at which backlog saturates.
    pub queue_cap: f64,
    /// Calendar occupancy is already a ratio; cap stays at 1.0.
    pub calendar_cap: f64,
    /// Context switches per minute at which churn saturates.
    pub switch_cap: f64,

    pub keystroke_weight: f64,
    pub pager_weight: f64,
    pub queue_weight: f64,
    pub calendar_weight: f64,
    pub switch_weight: f64,
}

impl AttentionConfig {
    /// Normalize weights to sum to 1.0.
    pub fn normalize(&mut self) {
        let sum = self.keystroke_weight
            + self.pager_weight
            + self.queue_weight
            + self.calendar_weight
            + self.switch_weight;
        if sum > 0.0 {
            self.keystroke_weight /= sum;
            self.pager_weight /= sum;
            self.queue_weight /= sum;
            self.calendar_weight /= sum;
            self.switch_weight /= sum;
        }
    }

    /// Validate caps and weights before the model accepts the config.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let caps = [
            ("keystroke_cap", self.keystroke_cap),
            ("pager_cap", self.pager_cap),
            ("queue_cap", self.queue_cap),
            ("calendar_cap", self.calendar_cap),
            ("switch_cap", self.switch_cap),
        ];
        for (name, cap) in caps {
            if !cap.is_finite() || cap <= 0.0 {
                return Err(ConfigError::InvalidValue {
                    key: name.to_string(),
                    message: format!("cap must be positive, got {cap}"),
                });
            }
        }

        let weights = [
            ("keystroke_weight", self.keystroke_weight),
            ("pager_weight", self.pager_weight),
            ("queue_weight", self.queue_weight),
            ("calendar_weight", self.calendar_weight),
            ("switch_weight", self.switch_weight),
        ];
        let mut sum = 0.0;
        for (name, weight) in weights {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ConfigError::InvalidValue {
                    key: name.to_string(),
                    message: format!("weight must be non-negative, got {weight}"),
                });
            }
            sum += weight;
        }
        if sum <= 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "weights".to_string(),
                message: "at least one weight must be positive".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for AttentionConfig {
    fn default() -> Self {
        Self {
            keystroke_cap: 120.0,
            pager_cap: 4.0,
            queue_cap: 10.0,
            calendar_cap: 1.0,
            switch_cap: 6.0,
            keystroke_weight: 0.2,
            pager_weight: 0.2,
            queue_weight: 0.2,
            calendar_weight: 0.2,
            switch_weight: 0.2,
        }
    }
}

/// Pure mapping of (telemetry summary, attention context) to a load scalar
/// in [0, 1]. Never blocks, never performs I/O.
#[derive(Debug, Clone, Default)]
pub struct AttentionModel {
    config: AttentionConfig,
}

impl AttentionModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut config: AttentionConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        config.normalize();
        Ok(Self { config })
    }

    pub fn config(&self) -> &AttentionConfig {
        &self.config
    }

    /// Score the operator's current load.
    ///
    /// Queue depth and calendar occupancy can arrive through both the
    /// telemetry summary and the context; the larger signal wins, matching
    /// how composite providers combine children. The result is monotone
    /// non-decreasing in every raw input.
    pub fn score(&self, summary: &TelemetrySummary, context: &AttentionContext) -> f64 {
        let cfg = &self.config;

        let queue_depth = summary.queue_depth.max(f64::from(context.queue_depth));
        let calendar = summary.calendar_load_ratio.max(context.calendar_load);

        let keystroke_part = saturate(summary.keystroke_rate, cfg.keystroke_cap);
        let pager_part = saturate(summary.pager_rate, cfg.pager_cap);
        let queue_part = saturate(queue_depth, cfg.queue_cap);
        let calendar_part = saturate(calendar, cfg.calendar_cap);
        let switch_part = saturate(context.context_switch_rate, cfg.switch_cap);

        let load = cfg.keystroke_weight * keystroke_part
            + cfg.pager_weight * pager_part
            + cfg.queue_weight * queue_part
            + cfg.calendar_weight * calendar_part
            + cfg.switch_weight * switch_part;
        load.clamp(0.0, 1.0)
    }
}

fn saturate(value: f64, cap: f64) -> f64 {
    (value / cap).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(keystroke_rate: f64, pager_rate: f64, queue_depth: f64, calendar: f64) -> TelemetrySummary {
        TelemetrySummary {
            keystroke_rate,
            pager_rate,
            queue_depth,
            calendar_load_ratio: calendar,
            sample_count: 1,
        }
    }

    #[test]
    fn test_idle_operator_scores_zero() {
        let model = AttentionModel::new();
        let load = model.score(&TelemetrySummary::default(), &AttentionContext::default());
        assert_eq!(load, 0.0);
    }

    #[test]
    fn test_saturated_operator_scores_one() {
        let model = AttentionModel::new();
        let ctx = AttentionContext {
            queue_depth: 50,
            calendar_load: 1.0,
            context_switch_rate: 10.0,
        };
        let load = model.score(&summary(500.0, 20.0, 50.0, 1.0), &ctx);
        assert_eq!(load, 1.0);
    }

    #[test]
    fn test_single_axis_contribution() {
        let model = AttentionModel::new();
        // 60 keystrokes/min is half the cap, weighted at 0.2.
        let load = model.score(&summary(60.0, 0.0, 0.0, 0.0), &AttentionContext::default());
        assert!((load - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_monotone_in_each_signal() {
        let model = AttentionModel::new();
        let base_summary = summary(40.0, 1.0, 2.0, 0.2);
        let base_ctx = AttentionContext {
            queue_depth: 1,
            calendar_load: 0.1,
            context_switch_rate: 1.0,
        };
        let base = model.score(&base_summary, &base_ctx);

        let bumps = [
            summary(80.0, 1.0, 2.0, 0.2),
            summary(40.0, 2.0, 2.0, 0.2),
            summary(40.0, 1.0, 5.0, 0.2),
            summary(40.0, 1.0, 2.0, 0.6),
        ];
        for bumped in bumps {
            assert!(model.score(&bumped, &base_ctx) >= base);
        }

        let busier_ctx = AttentionContext {
            queue_depth: 4,
            calendar_load: 0.5,
            context_switch_rate: 3.0,
        };
        assert!(model.score(&base_summary, &busier_ctx) >= base);
    }

    #[test]
    fn test_context_and_telemetry_combine_with_max() {
        let model = AttentionModel::new();
        let ctx = AttentionContext {
            queue_depth: 5,
            calendar_load: 0.0,
            context_switch_rate: 0.0,
        };
        let from_ctx = model.score(&TelemetrySummary::default(), &ctx);
        let from_telemetry = model.score(&summary(0.0, 0.0, 5.0, 0.0), &AttentionContext::default());
        let from_both = model.score(&summary(0.0, 0.0, 5.0, 0.0), &ctx);
        assert!((from_ctx - from_telemetry).abs() < 1e-9);
        assert!((from_both - from_ctx).abs() < 1e-9);
    }

    #[test]
    fn test_weights_normalized_on_construction() {
        let config = AttentionConfig {
            keystroke_weight: 2.0,
            pager_weight: 2.0,
            queue_weight: 2.0,
            calendar_weight: 2.0,
            switch_weight: 2.0,
            ..AttentionConfig::default()
        };
        let model = AttentionModel::with_config(config).unwrap();
        let sum = model.config().keystroke_weight
            + model.config().pager_weight
            + model.config().queue_weight
            + model.config().calendar_weight
            + model.config().switch_weight;
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = AttentionConfig {
            pager_cap: 0.0,
            ..AttentionConfig::default()
        };
        assert!(AttentionModel::with_config(config).is_err());

        let config = AttentionConfig {
            queue_weight: -0.1,
            ..AttentionConfig::default()
        };
        assert!(AttentionModel::with_config(config).is_err());
    }
}
