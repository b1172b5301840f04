//! Offline policy evaluation over historical records.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::attention::AttentionModel;
use crate::context::AttentionContext;
use crate::error::Result;
use crate::policy::{PolicyBuilder, PolicyOverrides, RoutingPolicy};
use crate::task::{Strategy, TaskIntent};
use crate::telemetry::TelemetrySummary;

fn default_true() -> bool {
    true
}

/// What actually happened for a recorded incident, if known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    #[serde(default = "default_true")]
    pub human_intervention: bool,
}

/// One replayable record: the operator's state and the task that arrived.
/// Records are independent; there are no ordering semantics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalRecord {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub telemetry: TelemetrySummary,
    #[serde(default)]
    pub context: AttentionContext,
    pub task: TaskIntent,
    #[serde(default)]
    pub baseline: Option<Baseline>,
}

impl HistoricalRecord {
    /// Records without a baseline flag count as human-handled, which is
    /// the conservative reading of legacy incident exports.
    pub fn baseline_human(&self) -> bool {
        self.baseline
            .as_ref()
            .map_or(true, |b| b.human_intervention)
    }
}

/// Aggregate outcome of replaying records through one policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub label: String,
    pub total_tasks: usize,
    pub strategy_counts: BTreeMap<Strategy, usize>,
    pub average_priority: f64,
    pub average_load: f64,
    /// Fraction of records a human handled historically.
    pub baseline_human_rate: f64,
    /// Fraction the router would send to a human (immediate or batch).
    pub router_human_rate: f64,
    /// Relative reduction; 0 when the baseline rate is 0.
    pub human_intervention_reduction: f64,
}

/// Replay records through a policy with the default attention model.
///
/// Pure: identical inputs yield an identical report.
pub fn evaluate(records: &[HistoricalRecord], policy: &RoutingPolicy) -> Result<Report> {
    evaluate_labeled(records, policy, "default")
}

pub fn evaluate_labeled(
    records: &[HistoricalRecord],
    policy: &RoutingPolicy,
    label: &str,
) -> Result<Report> {
    let model = AttentionModel::new();
    let mut strategy_counts: BTreeMap<Strategy, usize> = BTreeMap::new();
    let mut priority_sum = 0.0;
    let mut load_sum = 0.0;
    let mut baseline_humans = 0usize;
    let mut router_humans = 0usize;

    for record in records {
        let load = model.score(&record.telemetry, &record.context);
        let queue_depth = record
            .context
            .queue_depth
            .max(record.telemetry.queue_depth.round() as u32);
        let item = policy.route(&record.task, load, queue_depth, record.task.submitted_at)?;

        *strategy_counts.entry(item.strategy).or_insert(0) += 1;
        priority_sum += item.priority;
        load_sum += item.attention_load;
        if record.baseline_human() {
            baseline_humans += 1;
        }
        if item.strategy.needs_human() {
            router_humans += 1;
        }
    }

    let total = records.len();
    let (average_priority, average_load, baseline_human_rate, router_human_rate) = if total > 0 {
        let n = total as f64;
        (
            priority_sum / n,
            load_sum / n,
            baseline_humans as f64 / n,
            router_humans as f64 / n,
        )
    } else {
        (0.0, 0.0, 0.0, 0.0)
    };

    let human_intervention_reduction = if baseline_human_rate > 0.0 {
        (baseline_human_rate - router_human_rate) / baseline_human_rate
    } else {
        0.0
    };

    Ok(Report {
        label: label.to_string(),
        total_tasks: total,
        strategy_counts,
        average_priority,
        average_load,
        baseline_human_rate,
        router_human_rate,
        human_intervention_reduction,
    })
}

/// Evaluate every labelled policy in turn.
pub fn sweep(
    records: &[HistoricalRecord],
    policies: &[(String, RoutingPolicy)],
) -> Result<Vec<Report>> {
    policies
        .iter()
        .map(|(label, policy)| evaluate_labeled(records, policy, label))
        .collect()
}

/// Load a JSON array of historical records. Unknown fields inside each
/// record are tolerated.
pub fn load_records(path: &Path) -> Result<Vec<HistoricalRecord>> {
    let text = fs::read_to_string(path)?;
    let records: Vec<HistoricalRecord> = serde_json::from_str(&text)?;
    Ok(records)
}

/// One entry of a labelled policy sweep file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepEntry {
    #[serde(default)]
    pub label: Option<String>,
    pub policy: PolicyOverrides,
}

/// Load a sweep file: a JSON list of `{label, policy}` entries. Entries
/// without a label are numbered.
pub fn load_sweep(path: &Path) -> Result<Vec<(String, RoutingPolicy)>> {
    let text = fs::read_to_string(path)?;
    let entries: Vec<SweepEntry> = serde_json::from_str(&text)?;
    entries
        .into_iter()
        .enumerate()
        .map(|(idx, entry)| {
            let label = entry
                .label
                .unwrap_or_else(|| format!("policy-{}", idx + 1));
            let policy = PolicyBuilder::new().apply(&entry.policy).build()?;
            Ok((label, policy))
        })
        .collect()
}
