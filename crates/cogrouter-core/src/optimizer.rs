//! Grid search over routing policy configurations.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, Result};
use crate::evaluator::{evaluate_labeled, HistoricalRecord, Report};
use crate::policy::{PolicyBuilder, RoutingPolicy};

/// Candidate values per policy field. The search enumerates the Cartesian
/// product in a fixed field order, so results are deterministic. Fields
/// left empty fall back to the policy default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyGrid {
    pub slo_weights: Vec<f64>,
    pub uncertainty_weights: Vec<f64>,
    pub severity_weights: Vec<f64>,
    pub attention_weights: Vec<f64>,
    pub immediate_thresholds: Vec<f64>,
    pub batch_thresholds: Vec<f64>,
    pub min_confidence_for_auto: Vec<f64>,
    pub park_load_thresholds: Vec<f64>,
}

impl Default for PolicyGrid {
    fn default() -> Self {
        Self {
            slo_weights: vec![RoutingPolicy::DEFAULT_SLO_WEIGHT],
            uncertainty_weights: vec![RoutingPolicy::DEFAULT_UNCERTAINTY_WEIGHT],
            severity_weights: vec![RoutingPolicy::DEFAULT_SEVERITY_WEIGHT],
            attention_weights: vec![RoutingPolicy::DEFAULT_ATTENTION_WEIGHT],
            immediate_thresholds: vec![RoutingPolicy::DEFAULT_IMMEDIATE_THRESHOLD],
            batch_thresholds: vec![RoutingPolicy::DEFAULT_BATCH_THRESHOLD],
            min_confidence_for_auto: vec![RoutingPolicy::DEFAULT_MIN_CONFIDENCE_FOR_AUTO],
            park_load_thresholds: vec![RoutingPolicy::DEFAULT_PARK_LOAD_THRESHOLD],
        }
    }
}

impl PolicyGrid {
    /// Enumerate every valid policy in the grid, in a stable order.
    /// Combinations the builder rejects (e.g. inverted thresholds) are
    /// skipped.
    pub fn candidates(&self) -> Vec<RoutingPolicy> {
        let field = |values: &[f64], default: f64| -> Vec<f64> {
            if values.is_empty() {
                vec![default]
            } else {
                values.to_vec()
            }
        };
        let slo = field(&self.slo_weights, RoutingPolicy::DEFAULT_SLO_WEIGHT);
        let uncertainty = field(
            &self.uncertainty_weights,
            RoutingPolicy::DEFAULT_UNCERTAINTY_WEIGHT,
        );
        let severity = field(&self.severity_weights, RoutingPolicy::DEFAULT_SEVERITY_WEIGHT);
        let attention = field(
            &self.attention_weights,
            RoutingPolicy::DEFAULT_ATTENTION_WEIGHT,
        );
        let immediate = field(
            &self.immediate_thresholds,
            RoutingPolicy::DEFAULT_IMMEDIATE_THRESHOLD,
        );
        let batch = field(&self.batch_thresholds, RoutingPolicy::DEFAULT_BATCH_THRESHOLD);
        let confidence = field(
            &self.min_confidence_for_auto,
            RoutingPolicy::DEFAULT_MIN_CONFIDENCE_FOR_AUTO,
        );
        let park = field(
            &self.park_load_thresholds,
            RoutingPolicy::DEFAULT_PARK_LOAD_THRESHOLD,
        );

        let mut candidates = Vec::new();
        for &sw in &slo {
            for &uw in &uncertainty {
                for &vw in &severity {
                    for &aw in &attention {
                        for &imm in &immediate {
                            for &bat in &batch {
                                for &conf in &confidence {
                                    for &pk in &park {
                                        let built = PolicyBuilder::new()
                                            .slo_weight(sw)
                                            .uncertainty_weight(uw)
                                            .severity_weight(vw)
                                            .attention_weight(aw)
                                            .immediate_threshold(imm)
                                            .batch_threshold(bat)
                                            .min_confidence_for_auto(conf)
                                            .park_load_threshold(pk)
                                            .build();
                                        match built {
                                            Ok(policy) => candidates.push(policy),
                                            Err(err) => {
                                                debug!(error = %err, "skipping invalid grid point");
                                            }
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
        candidates
    }
}

/// Load a policy grid from a JSON file.
pub fn load_grid(path: &Path) -> Result<PolicyGrid> {
    let text = fs::read_to_string(path)?;
    let grid: PolicyGrid = serde_json::from_str(&text)?;
    Ok(grid)
}

/// What the search minimizes. Every objective is expressed as a score
/// where lower is better.
#[derive(Debug, Clone, Copy)]
pub enum Objective {
    /// Minimize the fraction of tasks sent to a human.
    HumanRate,
    /// Maximize the average priority of routed items.
    PriorityMean,
    /// Caller-supplied score over the report; lower is better.
    Custom(fn(&Report) -> f64),
}

impl Objective {
    pub fn score(&self, report: &Report) -> f64 {
        match self {
            Objective::HumanRate => report.router_human_rate,
            Objective::PriorityMean => -report.average_priority,
            Objective::Custom(f) => f(report),
        }
    }
}

/// The winning candidate of a grid search.
#[derive(Debug, Clone)]
pub struct OptimizationOutcome {
    pub policy: RoutingPolicy,
    pub report: Report,
    pub score: f64,
}

/// Search the grid for the best-scoring policy. Candidates whose router
/// human rate exceeds `max_router_rate` are discarded. Ties keep the
/// first candidate encountered, so the search is reproducible.
pub fn optimize(
    records: &[HistoricalRecord],
    grid: &PolicyGrid,
    objective: Objective,
    max_router_rate: Option<f64>,
) -> Result<OptimizationOutcome> {
    let mut best: Option<OptimizationOutcome> = None;

    for (idx, policy) in grid.candidates().into_iter().enumerate() {
        let label = format!("grid-{}", idx + 1);
        let report = evaluate_labeled(records, &policy, &label)?;
        if let Some(cap) = max_router_rate {
            if report.router_human_rate > cap {
                continue;
            }
        }
        let score = objective.score(&report);
        let improves = best.as_ref().map_or(true, |b| score < b.score);
        if improves {
            best = Some(OptimizationOutcome {
                policy,
                report,
                score,
            });
        }
    }

    best.ok_or_else(|| ConfigError::EmptyGrid.into())
}
