//! Deterministic end-to-end simulation of the routing loop.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{Duration, Utc};

use crate::attention::AttentionModel;
use crate::context::{AttentionContext, QueueAwareContextProvider, StaticContextProvider};
use crate::error::Result;
use crate::policy::RoutingPolicy;
use crate::router::{RouterService, SinkSelector, WorkSink};
use crate::task::{SensitivityTag, Strategy, TaskIntent, WorkItem};
use crate::telemetry::{TelemetryCollector, TelemetrySample};
use crate::workflow::WorkflowEngine;

/// Seedable xorshift64* generator. Reproducible simulations are part of
/// the contract, so no external RNG is involved.
#[derive(Debug, Clone, Copy)]
pub struct SimRng {
    state: u64,
}

impl SimRng {
    pub fn new(seed: u64) -> Self {
        // Xorshift has a single absorbing state at zero.
        Self {
            state: seed.max(1),
        }
    }

    fn next_u64(&mut self) -> u64 {
        self.state ^= self.state >> 12;
        self.state ^= self.state << 25;
        self.state ^= self.state >> 27;
        self.state.wrapping_mul(0x2545_f491_4f6c_dd1d)
    }

    pub fn next_u32_range(&mut self, max: u32) -> u32 {
        ((self.next_u64() >> 32) as u32) % max.max(1)
    }

    pub fn next_f64_range(&mut self, low: f64, high: f64) -> f64 {
        let unit = (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64;
        low + unit * (high - low)
    }
}

/// Parameters for one simulation run.
#[derive(Debug, Clone, Copy)]
pub struct SimulationConfig {
    pub tasks: usize,
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self { tasks: 5, seed: 42 }
    }
}

/// Transcript and routed items from a run.
#[derive(Debug)]
pub struct SimulationOutcome {
    pub transcript: Vec<String>,
    pub items: Vec<WorkItem>,
    /// Final human-facing backlog depth.
    pub queue_depth: usize,
}

struct TranscriptSink {
    lines: Mutex<Vec<String>>,
}

impl TranscriptSink {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            lines: Mutex::new(Vec::new()),
        })
    }

    fn take_lines(&self) -> Vec<String> {
        std::mem::take(
            &mut *self
                .lines
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }
}

impl WorkSink for TranscriptSink {
    fn name(&self) -> &str {
        "transcript"
    }

    fn deliver(&self, item: &WorkItem) -> Result<()> {
        let line = format!(
            "[{}] {} priority={:.2} load={:.2} queue={} ({})",
            item.strategy.as_str().to_uppercase(),
            item.task.task_id,
            item.priority,
            item.attention_load,
            item.queue_depth,
            item.rationale.detail,
        );
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line);
        Ok(())
    }
}

const EXPLANATIONS: [&str; 4] = [
    "SLO drift detected",
    "Policy compliance uncertainty",
    "Data ambiguity requires review",
    "User escalation waiting",
];

const SENSITIVITIES: [SensitivityTag; 4] = [
    SensitivityTag::Standard,
    SensitivityTag::Standard,
    SensitivityTag::Confidential,
    SensitivityTag::Regulated,
];

fn random_task(rng: &mut SimRng, ordinal: usize) -> Result<TaskIntent> {
    let severity = 1 + rng.next_u32_range(5) as u8;
    let slo_risk = rng.next_f64_range(5.0, 45.0);
    let confidence = rng.next_f64_range(0.4, 0.99);
    let explanation = EXPLANATIONS[rng.next_u32_range(EXPLANATIONS.len() as u32) as usize];
    let sensitivity = SENSITIVITIES[rng.next_u32_range(SENSITIVITIES.len() as u32) as usize];
    Ok(
        TaskIntent::new(format!("task-{ordinal}"), severity, slo_risk, confidence, explanation)?
            .with_sensitivity(sensitivity)
            .with_source("simulation"),
    )
}

/// Run a full routing loop: seeded telemetry, a queue-aware workflow
/// engine fed back as context, and generated task intents. The transcript
/// depends only on the seed and task count.
pub fn run_simulation(config: &SimulationConfig) -> Result<SimulationOutcome> {
    let mut rng = SimRng::new(config.seed);
    let now = Utc::now();

    let mut collector = TelemetryCollector::default();
    for step in 0..=6 {
        let minutes_ago = 30 - step * 5;
        let sample = TelemetrySample::new(
            now - Duration::minutes(minutes_ago),
            300 + rng.next_u32_range(400),
            rng.next_u32_range(3),
            rng.next_u32_range(5),
            rng.next_f64_range(0.0, 25.0),
        )?;
        collector.record(sample)?;
    }

    let mut router = RouterService::new(
        collector,
        AttentionModel::new(),
        RoutingPolicy::default(),
    );

    let engine = Arc::new(WorkflowEngine::new());
    router.register_provider(Box::new(QueueAwareContextProvider::new(engine.clone())));
    router.register_provider(Box::new(StaticContextProvider::new(AttentionContext {
        context_switch_rate: rng.next_f64_range(1.0, 6.0),
        ..AttentionContext::default()
    })));

    router.register_sink(SinkSelector::Strategy(Strategy::Immediate), engine.clone());
    router.register_sink(SinkSelector::Strategy(Strategy::Batch), engine.clone());
    let transcript = TranscriptSink::new();
    router.register_sink(SinkSelector::Any, transcript.clone());

    let mut items = Vec::with_capacity(config.tasks);
    for ordinal in 1..=config.tasks {
        let task = random_task(&mut rng, ordinal)?;
        items.push(router.handle_task_at(&task, now)?);
    }

    Ok(SimulationOutcome {
        transcript: transcript.take_lines(),
        items,
        queue_depth: engine.depth(None),
    })
}
