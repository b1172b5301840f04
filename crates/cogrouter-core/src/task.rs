//! Task intents and routed work items.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bus::BusMessage;
use crate::error::{Result, RouterError};

/// Data-handling sensitivity of a task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensitivityTag {
    #[default]
    Standard,
    Confidential,
    /// Regulated tasks are never silently parked.
    Regulated,
}

/// The router's four-way decision for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Interrupt the operator now.
    Immediate,
    /// Queue for batched human review.
    Batch,
    /// Resolve without human involvement.
    Auto,
    /// Hold for later reconsideration.
    Park,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Immediate => "immediate",
            Strategy::Batch => "batch",
            Strategy::Auto => "auto",
            Strategy::Park => "park",
        }
    }

    /// Whether this strategy consumes human attention.
    pub fn needs_human(&self) -> bool {
        matches!(self, Strategy::Immediate | Strategy::Batch)
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_source() -> String {
    "agent".to_string()
}

/// An agent or monitoring-system request for human time.
///
/// Immutable after creation; `task_id` is expected to be unique within a
/// routing session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskIntent {
    pub task_id: String,
    /// Severity in 1..=5, 5 most severe.
    pub severity: u8,
    /// Minutes until an SLO breach if nobody acts.
    pub slo_risk_minutes: f64,
    /// The emitting model's self-reported certainty, in [0, 1].
    pub model_confidence: f64,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub sensitivity_tag: SensitivityTag,
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default = "Utc::now")]
    pub submitted_at: DateTime<Utc>,
}

impl TaskIntent {
    /// Create a validated task intent.
    pub fn new(
        task_id: impl Into<String>,
        severity: u8,
        slo_risk_minutes: f64,
        model_confidence: f64,
        explanation: impl Into<String>,
    ) -> Result<Self> {
        let intent = Self {
            task_id: task_id.into(),
            severity,
            slo_risk_minutes,
            model_confidence,
            explanation: explanation.into(),
            sensitivity_tag: SensitivityTag::Standard,
            source: default_source(),
            submitted_at: Utc::now(),
        };
        intent.validate()?;
        Ok(intent)
    }

    pub fn with_sensitivity(mut self, tag: SensitivityTag) -> Self {
        self.sensitivity_tag = tag;
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Check the documented field constraints.
    pub fn validate(&self) -> Result<()> {
        if self.task_id.is_empty() {
            return Err(invalid("task_id", "must not be empty"));
        }
        if !(1..=5).contains(&self.severity) {
            return Err(invalid(
                "severity",
                format!("must be in 1..=5, got {}", self.severity),
            ));
        }
        if !self.slo_risk_minutes.is_finite() || self.slo_risk_minutes < 0.0 {
            return Err(invalid(
                "slo_risk_minutes",
                format!("must be finite and non-negative, got {}", self.slo_risk_minutes),
            ));
        }
        if !self.model_confidence.is_finite() || !(0.0..=1.0).contains(&self.model_confidence) {
            return Err(invalid(
                "model_confidence",
                format!("must be in [0, 1], got {}", self.model_confidence),
            ));
        }
        Ok(())
    }

    /// Parse a task intent from a bus message. Unknown fields are
    /// tolerated; missing required fields reject the message.
    pub fn from_message(message: &BusMessage) -> Result<Self> {
        let intent: TaskIntent = serde_json::from_value(message.clone()).map_err(|err| {
            RouterError::InvalidArgument {
                field: "task_intent".to_string(),
                message: err.to_string(),
            }
        })?;
        intent.validate()?;
        Ok(intent)
    }
}

fn invalid(field: &str, message: impl Into<String>) -> RouterError {
    RouterError::InvalidArgument {
        field: field.to_string(),
        message: message.into(),
    }
}

/// One named component of a priority score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RationaleTerm {
    pub name: String,
    pub weight: f64,
    /// Raw component value in [0, 1] before weighting.
    pub score: f64,
    pub contribution: f64,
}

impl RationaleTerm {
    pub fn new(name: impl Into<String>, weight: f64, score: f64) -> Self {
        Self {
            name: name.into(),
            weight,
            score,
            contribution: weight * score,
        }
    }
}

/// Which routing rule selected the strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingRule {
    /// High confidence, bounded severity, and no looming deadline.
    AutoSafe,
    /// Operator saturated and the task can wait.
    OverloadPark,
    /// The overload rule matched but regulated tasks escalate to batch.
    RegulatedEscalation,
    PriorityImmediate,
    PriorityBatch,
    /// Priority fell below the batch threshold.
    DefaultPark,
}

/// Structured breakdown of a routing decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rationale {
    /// Per-component contributions to the priority score.
    pub terms: Vec<RationaleTerm>,
    pub rule: RoutingRule,
    /// Human-readable account of why the rule fired.
    pub detail: String,
}

/// The routed decision for one task intent. Owned by sinks after dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub task: TaskIntent,
    pub strategy: Strategy,
    /// Priority score in [0, 1].
    pub priority: f64,
    /// Attention load at decision time, in [0, 1].
    pub attention_load: f64,
    /// Workflow queue depth observed at decision time.
    pub queue_depth: u32,
    pub rationale: Rationale,
    pub decided_at: DateTime<Utc>,
}

impl WorkItem {
    /// Serialize for the work-item egress topic.
    pub fn to_message(&self) -> Result<BusMessage> {
        Ok(serde_json::to_value(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_validation_bounds() {
        assert!(TaskIntent::new("t1", 3, 10.0, 0.5, "ok").is_ok());
        assert!(TaskIntent::new("t1", 0, 10.0, 0.5, "bad severity").is_err());
        assert!(TaskIntent::new("t1", 6, 10.0, 0.5, "bad severity").is_err());
        assert!(TaskIntent::new("t1", 3, -1.0, 0.5, "bad slo").is_err());
        assert!(TaskIntent::new("t1", 3, 10.0, 1.5, "bad confidence").is_err());
        assert!(TaskIntent::new("", 3, 10.0, 0.5, "bad id").is_err());
    }

    #[test]
    fn test_from_message_tolerates_unknown_fields() {
        let message = serde_json::json!({
            "task_id": "t1",
            "severity": 4,
            "slo_risk_minutes": 12.0,
            "model_confidence": 0.6,
            "explanation": "disk filling",
            "vendor_extra": {"ignored": true}
        });
        let intent = TaskIntent::from_message(&message).unwrap();
        assert_eq!(intent.task_id, "t1");
        assert_eq!(intent.severity, 4);
        assert_eq!(intent.source, "agent");
    }

    #[test]
    fn test_from_message_rejects_missing_required() {
        let message = serde_json::json!({"task_id": "t1", "severity": 4});
        let err = TaskIntent::from_message(&message).unwrap_err();
        assert!(matches!(err, RouterError::InvalidArgument { .. }));
    }

    #[test]
    fn test_work_item_roundtrip() {
        let task = TaskIntent::new("t1", 2, 30.0, 0.9, "routine cleanup").unwrap();
        let item = WorkItem {
            task,
            strategy: Strategy::Auto,
            priority: 0.42,
            attention_load: 0.3,
            queue_depth: 1,
            rationale: Rationale {
                terms: vec![RationaleTerm::new("severity", 0.25, 0.4)],
                rule: RoutingRule::AutoSafe,
                detail: "confidence 0.90 >= 0.85".to_string(),
            },
            decided_at: Utc::now(),
        };
        let message = item.to_message().unwrap();
        let parsed: WorkItem = serde_json::from_value(message).unwrap();
        assert_eq!(parsed, item);
    }

    #[test]
    fn test_strategy_needs_human() {
        assert!(Strategy::Immediate.needs_human());
        assert!(Strategy::Batch.needs_human());
        assert!(!Strategy::Auto.needs_human());
        assert!(!Strategy::Park.needs_human());
    }
}
