//! Routing policy: priority scoring and the four-way strategy decision.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::task::{
    Rationale, RationaleTerm, RoutingRule, SensitivityTag, Strategy, TaskIntent, WorkItem,
};

/// Immutable routing configuration. Built through [`PolicyBuilder`], which
/// normalizes the four score weights to sum to 1 and rejects out-of-range
/// values; replace a running policy by constructing a new one and swapping
/// it in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PolicyOverrides")]
pub struct RoutingPolicy {
    slo_weight: f64,
    uncertainty_weight: f64,
    severity_weight: f64,
    attention_weight: f64,
    slo_horizon_minutes: f64,
    immediate_threshold: f64,
    batch_threshold: f64,
    min_confidence_for_auto: f64,
    max_severity_for_auto: u8,
    auto_min_slo_minutes: f64,
    park_load_threshold: f64,
}

impl RoutingPolicy {
    pub const DEFAULT_SLO_WEIGHT: f64 = 0.4;
    pub const DEFAULT_UNCERTAINTY_WEIGHT: f64 = 0.25;
    pub const DEFAULT_SEVERITY_WEIGHT: f64 = 0.25;
    pub const DEFAULT_ATTENTION_WEIGHT: f64 = 0.1;
    pub const DEFAULT_SLO_HORIZON_MINUTES: f64 = 60.0;
    pub const DEFAULT_IMMEDIATE_THRESHOLD: f64 = 0.75;
    pub const DEFAULT_BATCH_THRESHOLD: f64 = 0.45;
    pub const DEFAULT_MIN_CONFIDENCE_FOR_AUTO: f64 = 0.85;
    pub const DEFAULT_MAX_SEVERITY_FOR_AUTO: u8 = 2;
    pub const DEFAULT_AUTO_MIN_SLO_MINUTES: f64 = 15.0;
    pub const DEFAULT_PARK_LOAD_THRESHOLD: f64 = 0.7;

    pub fn builder() -> PolicyBuilder {
        PolicyBuilder::new()
    }

    pub fn slo_weight(&self) -> f64 {
        self.slo_weight
    }

    pub fn uncertainty_weight(&self) -> f64 {
        self.uncertainty_weight
    }

    pub fn severity_weight(&self) -> f64 {
        self.severity_weight
    }

    pub fn attention_weight(&self) -> f64 {
        self.attention_weight
    }

    pub fn immediate_threshold(&self) -> f64 {
        self.immediate_threshold
    }

    pub fn batch_threshold(&self) -> f64 {
        self.batch_threshold
    }

    pub fn park_load_threshold(&self) -> f64 {
        self.park_load_threshold
    }

    /// Compute the priority score and its per-component breakdown.
    ///
    /// An available operator (low load) pushes priority up toward an
    /// interrupt; a saturated one biases away from it.
    pub fn priority(&self, task: &TaskIntent, attention_load: f64) -> (f64, Vec<RationaleTerm>) {
        let load = attention_load.clamp(0.0, 1.0);
        let slo_component =
            1.0 - (task.slo_risk_minutes / self.slo_horizon_minutes).clamp(0.0, 1.0);
        let uncertainty_component = 1.0 - task.model_confidence;
        let severity_component = f64::from(task.severity) / 5.0;
        let availability_component = 1.0 - load;

        let terms = vec![
            RationaleTerm::new("slo_risk", self.slo_weight, slo_component),
            RationaleTerm::new("uncertainty", self.uncertainty_weight, uncertainty_component),
            RationaleTerm::new("severity", self.severity_weight, severity_component),
            RationaleTerm::new(
                "operator_availability",
                self.attention_weight,
                availability_component,
            ),
        ];
        let priority: f64 = terms.iter().map(|t| t.contribution).sum();
        (priority.clamp(0.0, 1.0), terms)
    }

    /// Route a task into a work item. Total for valid inputs; invalid
    /// tasks fail with `InvalidArgument`.
    ///
    /// The rules are evaluated in a fixed order and boundary equalities
    /// resolve toward the higher-urgency bucket.
    pub fn route(
        &self,
        task: &TaskIntent,
        attention_load: f64,
        queue_depth: u32,
        decided_at: DateTime<Utc>,
    ) -> Result<WorkItem> {
        task.validate()?;
        let load = attention_load.clamp(0.0, 1.0);
        let (priority, terms) = self.priority(task, load);

        let (strategy, rule, detail) = self.select_strategy(task, priority, load);

        Ok(WorkItem {
            task: task.clone(),
            strategy,
            priority,
            attention_load: load,
            queue_depth,
            rationale: Rationale {
                terms,
                rule,
                detail,
            },
            decided_at,
        })
    }

    fn select_strategy(
        &self,
        task: &TaskIntent,
        priority: f64,
        load: f64,
    ) -> (Strategy, RoutingRule, String) {
        // Safe automation requires high confidence, a bounded blast
        // radius, and no imminent deadline.
        if task.model_confidence >= self.min_confidence_for_auto
            && task.severity <= self.max_severity_for_auto
            && task.slo_risk_minutes >= self.auto_min_slo_minutes
        {
            return (
                Strategy::Auto,
                RoutingRule::AutoSafe,
                format!(
                    "confidence {:.2} >= {:.2}, severity {} <= {}, slo risk {:.0}m >= {:.0}m",
                    task.model_confidence,
                    self.min_confidence_for_auto,
                    task.severity,
                    self.max_severity_for_auto,
                    task.slo_risk_minutes,
                    self.auto_min_slo_minutes
                ),
            );
        }

        if load >= self.park_load_threshold && priority < self.immediate_threshold {
            if task.sensitivity_tag == SensitivityTag::Regulated {
                return (
                    Strategy::Batch,
                    RoutingRule::RegulatedEscalation,
                    format!(
                        "load {:.2} >= park_load_threshold {:.2} but regulated tasks are never parked",
                        load, self.park_load_threshold
                    ),
                );
            }
            return (
                Strategy::Park,
                RoutingRule::OverloadPark,
                format!(
                    "load {:.2} >= park_load_threshold {:.2} and priority {:.2} < {:.2}",
                    load, self.park_load_threshold, priority, self.immediate_threshold
                ),
            );
        }

        if priority >= self.immediate_threshold {
            return (
                Strategy::Immediate,
                RoutingRule::PriorityImmediate,
                format!(
                    "priority {:.2} >= immediate threshold {:.2}",
                    priority, self.immediate_threshold
                ),
            );
        }

        if priority >= self.batch_threshold {
            return (
                Strategy::Batch,
                RoutingRule::PriorityBatch,
                format!(
                    "priority {:.2} >= batch threshold {:.2}",
                    priority, self.batch_threshold
                ),
            );
        }

        (
            Strategy::Park,
            RoutingRule::DefaultPark,
            format!(
                "priority {:.2} below batch threshold {:.2}",
                priority, self.batch_threshold
            ),
        )
    }
}

impl Default for RoutingPolicy {
    fn default() -> Self {
        Self {
            slo_weight: Self::DEFAULT_SLO_WEIGHT,
            uncertainty_weight: Self::DEFAULT_UNCERTAINTY_WEIGHT,
            severity_weight: Self::DEFAULT_SEVERITY_WEIGHT,
            attention_weight: Self::DEFAULT_ATTENTION_WEIGHT,
            slo_horizon_minutes: Self::DEFAULT_SLO_HORIZON_MINUTES,
            immediate_threshold: Self::DEFAULT_IMMEDIATE_THRESHOLD,
            batch_threshold: Self::DEFAULT_BATCH_THRESHOLD,
            min_confidence_for_auto: Self::DEFAULT_MIN_CONFIDENCE_FOR_AUTO,
            max_severity_for_auto: Self::DEFAULT_MAX_SEVERITY_FOR_AUTO,
            auto_min_slo_minutes: Self::DEFAULT_AUTO_MIN_SLO_MINUTES,
            park_load_threshold: Self::DEFAULT_PARK_LOAD_THRESHOLD,
        }
    }
}

/// Partial policy configuration, as read from files or update requests.
/// Absent fields keep their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyOverrides {
    pub slo_weight: Option<f64>,
    pub uncertainty_weight: Option<f64>,
    pub severity_weight: Option<f64>,
    pub attention_weight: Option<f64>,
    pub slo_horizon_minutes: Option<f64>,
    pub immediate_threshold: Option<f64>,
    pub batch_threshold: Option<f64>,
    pub min_confidence_for_auto: Option<f64>,
    pub max_severity_for_auto: Option<u8>,
    pub auto_min_slo_minutes: Option<f64>,
    pub park_load_threshold: Option<f64>,
}

impl TryFrom<PolicyOverrides> for RoutingPolicy {
    type Error = ConfigError;

    fn try_from(overrides: PolicyOverrides) -> std::result::Result<Self, Self::Error> {
        PolicyBuilder::new().apply(&overrides).build()
    }
}

/// Validating builder for [`RoutingPolicy`]. Starts from the defaults.
#[derive(Debug, Clone)]
pub struct PolicyBuilder {
    slo_weight: f64,
    uncertainty_weight: f64,
    severity_weight: f64,
    attention_weight: f64,
    slo_horizon_minutes: f64,
    immediate_threshold: f64,
    batch_threshold: f64,
    min_confidence_for_auto: f64,
    max_severity_for_auto: u8,
    auto_min_slo_minutes: f64,
    park_load_threshold: f64,
}

impl PolicyBuilder {
    pub fn new() -> Self {
        let defaults = RoutingPolicy::default();
        Self {
            slo_weight: defaults.slo_weight,
            uncertainty_weight: defaults.uncertainty_weight,
            severity_weight: defaults.severity_weight,
            attention_weight: defaults.attention_weight,
            slo_horizon_minutes: defaults.slo_horizon_minutes,
            immediate_threshold: defaults.immediate_threshold,
            batch_threshold: defaults.batch_threshold,
            min_confidence_for_auto: defaults.min_confidence_for_auto,
            max_severity_for_auto: defaults.max_severity_for_auto,
            auto_min_slo_minutes: defaults.auto_min_slo_minutes,
            park_load_threshold: defaults.park_load_threshold,
        }
    }

    pub fn slo_weight(mut self, value: f64) -> Self {
        self.slo_weight = value;
        self
    }

    pub fn uncertainty_weight(mut self, value: f64) -> Self {
        self.uncertainty_weight = value;
        self
    }

    pub fn severity_weight(mut self, value: f64) -> Self {
        self.severity_weight = value;
        self
    }

    pub fn attention_weight(mut self, value: f64) -> Self {
        self.attention_weight = value;
        self
    }

    pub fn slo_horizon_minutes(mut self, value: f64) -> Self {
        self.slo_horizon_minutes = value;
        self
    }

    pub fn immediate_threshold(mut self, value: f64) -> Self {
        self.immediate_threshold = value;
        self
    }

    pub fn batch_threshold(mut self, value: f64) -> Self {
        self.batch_threshold = value;
        self
    }

    pub fn min_confidence_for_auto(mut self, value: f64) -> Self {
        self.min_confidence_for_auto = value;
        self
    }

    pub fn max_severity_for_auto(mut self, value: u8) -> Self {
        self.max_severity_for_auto = value;
        self
    }

    pub fn auto_min_slo_minutes(mut self, value: f64) -> Self {
        self.auto_min_slo_minutes = value;
        self
    }

    pub fn park_load_threshold(mut self, value: f64) -> Self {
        self.park_load_threshold = value;
        self
    }

    /// Overlay a partial configuration.
    pub fn apply(mut self, overrides: &PolicyOverrides) -> Self {
        if let Some(v) = overrides.slo_weight {
            self.slo_weight = v;
        }
        if let Some(v) = overrides.uncertainty_weight {
            self.uncertainty_weight = v;
        }
        if let Some(v) = overrides.severity_weight {
            self.severity_weight = v;
        }
        if let Some(v) = overrides.attention_weight {
            self.attention_weight = v;
        }
        if let Some(v) = overrides.slo_horizon_minutes {
            self.slo_horizon_minutes = v;
        }
        if let Some(v) = overrides.immediate_threshold {
            self.immediate_threshold = v;
        }
        if let Some(v) = overrides.batch_threshold {
            self.batch_threshold = v;
        }
        if let Some(v) = overrides.min_confidence_for_auto {
            self.min_confidence_for_auto = v;
        }
        if let Some(v) = overrides.max_severity_for_auto {
            self.max_severity_for_auto = v;
        }
        if let Some(v) = overrides.auto_min_slo_minutes {
            self.auto_min_slo_minutes = v;
        }
        if let Some(v) = overrides.park_load_threshold {
            self.park_load_threshold = v;
        }
        self
    }

    /// Validate and normalize into an immutable policy.
    pub fn build(self) -> std::result::Result<RoutingPolicy, ConfigError> {
        let weights = [
            ("slo_weight", self.slo_weight),
            ("uncertainty_weight", self.uncertainty_weight),
            ("severity_weight", self.severity_weight),
            ("attention_weight", self.attention_weight),
        ];
        let mut weight_sum = 0.0;
        for (name, weight) in weights {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ConfigError::InvalidValue {
                    key: name.to_string(),
                    message: format!("weight must be non-negative, got {weight}"),
                });
            }
            weight_sum += weight;
        }
        if weight_sum <= 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "weights".to_string(),
                message: "at least one score weight must be positive".to_string(),
            });
        }

        for (name, value) in [
            ("immediate_threshold", self.immediate_threshold),
            ("batch_threshold", self.batch_threshold),
            ("park_load_threshold", self.park_load_threshold),
        ] {
            if !value.is_finite() || value <= 0.0 || value >= 1.0 {
                return Err(ConfigError::InvalidValue {
                    key: name.to_string(),
                    message: format!("must be in (0, 1), got {value}"),
                });
            }
        }
        if self.immediate_threshold <= self.batch_threshold {
            return Err(ConfigError::ThresholdOrder {
                immediate: self.immediate_threshold,
                batch: self.batch_threshold,
            });
        }
        if !self.min_confidence_for_auto.is_finite()
            || self.min_confidence_for_auto <= 0.0
            || self.min_confidence_for_auto > 1.0
        {
            return Err(ConfigError::InvalidValue {
                key: "min_confidence_for_auto".to_string(),
                message: format!("must be in (0, 1], got {}", self.min_confidence_for_auto),
            });
        }
        if !(1..=5).contains(&self.max_severity_for_auto) {
            return Err(ConfigError::InvalidValue {
                key: "max_severity_for_auto".to_string(),
                message: format!("must be in 1..=5, got {}", self.max_severity_for_auto),
            });
        }
        if !self.slo_horizon_minutes.is_finite() || self.slo_horizon_minutes <= 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "slo_horizon_minutes".to_string(),
                message: format!("must be positive, got {}", self.slo_horizon_minutes),
            });
        }
        if !self.auto_min_slo_minutes.is_finite() || self.auto_min_slo_minutes < 0.0 {
            return Err(ConfigError::InvalidValue {
                key: "auto_min_slo_minutes".to_string(),
                message: format!("must be non-negative, got {}", self.auto_min_slo_minutes),
            });
        }

        Ok(RoutingPolicy {
            slo_weight: self.slo_weight / weight_sum,
            uncertainty_weight: self.uncertainty_weight / weight_sum,
            severity_weight: self.severity_weight / weight_sum,
            attention_weight: self.attention_weight / weight_sum,
            slo_horizon_minutes: self.slo_horizon_minutes,
            immediate_threshold: self.immediate_threshold,
            batch_threshold: self.batch_threshold,
            min_confidence_for_auto: self.min_confidence_for_auto,
            max_severity_for_auto: self.max_severity_for_auto,
            auto_min_slo_minutes: self.auto_min_slo_minutes,
            park_load_threshold: self.park_load_threshold,
        })
    }
}

impl Default for PolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}
