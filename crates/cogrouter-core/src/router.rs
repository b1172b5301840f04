//! Router service: composes telemetry, context, attention, and policy.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, warn};

use crate::attention::AttentionModel;
use crate::context::{AttentionContext, ContextProvider};
use crate::error::Result;
use crate::policy::RoutingPolicy;
use crate::task::{Strategy, TaskIntent, WorkItem};
use crate::telemetry::{TelemetryCollector, TelemetrySample, TelemetrySummary};

/// Which work items a sink receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SinkSelector {
    Strategy(Strategy),
    /// Receives every work item regardless of strategy.
    Any,
}

/// Consumer of routed work items. Sinks see an immutable item; a failing
/// sink is logged and never blocks other sinks or the routing result.
pub trait WorkSink: Send + Sync {
    /// Identifier used in error logs.
    fn name(&self) -> &str;

    fn deliver(&self, item: &WorkItem) -> Result<()>;
}

/// One router instance owns its collector, providers, model, policy, and
/// sink registry; concurrent arrivals serialize through `handle_task`.
/// There is no process-wide state.
pub struct RouterService {
    telemetry: TelemetryCollector,
    providers: Vec<Box<dyn ContextProvider>>,
    model: AttentionModel,
    policy: RoutingPolicy,
    sinks: HashMap<SinkSelector, Vec<Arc<dyn WorkSink>>>,
}

impl RouterService {
    pub fn new(
        telemetry: TelemetryCollector,
        model: AttentionModel,
        policy: RoutingPolicy,
    ) -> Self {
        Self {
            telemetry,
            providers: Vec::new(),
            model,
            policy,
            sinks: HashMap::new(),
        }
    }

    pub fn register_provider(&mut self, provider: Box<dyn ContextProvider>) {
        self.providers.push(provider);
    }

    /// Register a sink for a strategy (or the wildcard). Idempotent on
    /// sink identity: registering the same instance twice is a no-op.
    pub fn register_sink(&mut self, selector: SinkSelector, sink: Arc<dyn WorkSink>) {
        let sinks = self.sinks.entry(selector).or_default();
        if sinks.iter().any(|existing| Arc::ptr_eq(existing, &sink)) {
            debug!(sink = sink.name(), "sink already registered; skipping");
            return;
        }
        sinks.push(sink);
    }

    /// Replace the policy atomically. In-flight calls are unaffected;
    /// the next `handle_task` sees the new policy.
    pub fn update_policy(&mut self, policy: RoutingPolicy) {
        self.policy = policy;
    }

    pub fn policy(&self) -> &RoutingPolicy {
        &self.policy
    }

    /// Feed an interaction sample into the rolling telemetry window.
    pub fn record_sample(&mut self, sample: TelemetrySample) -> Result<()> {
        self.telemetry.record(sample)
    }

    /// The latest telemetry aggregate (stale samples evicted first).
    pub fn telemetry_summary(&mut self, now: DateTime<Utc>) -> TelemetrySummary {
        self.telemetry.summary(now)
    }

    /// Route a task intent into a work item and dispatch it to the
    /// registered sinks. Total for well-formed tasks: provider and sink
    /// failures are absorbed and logged.
    pub fn handle_task(&mut self, task: &TaskIntent) -> Result<WorkItem> {
        self.handle_task_at(task, Utc::now())
    }

    /// As [`handle_task`](Self::handle_task) with an explicit clock, so
    /// replays and tests control time.
    pub fn handle_task_at(&mut self, task: &TaskIntent, now: DateTime<Utc>) -> Result<WorkItem> {
        task.validate()?;

        let summary = self.telemetry.summary(now);
        let context = self.compose_context(now);
        let load = self.model.score(&summary, &context);
        let queue_depth = context
            .queue_depth
            .max(summary.queue_depth.round() as u32);

        let item = self.policy.route(task, load, queue_depth, now)?;
        self.dispatch(&item);
        Ok(item)
    }

    /// Merge all provider snapshots. A failing provider contributes a
    /// zero context and a warning; the router always proceeds.
    fn compose_context(&self, now: DateTime<Utc>) -> AttentionContext {
        let mut merged = AttentionContext::default();
        for provider in &self.providers {
            match provider.snapshot(now) {
                Ok(context) => merged = merged.merge(context),
                Err(err) => {
                    warn!(provider = provider.name(), error = %err, "context provider failed; using zero context");
                }
            }
        }
        merged
    }

    fn dispatch(&self, item: &WorkItem) {
        let selectors = [SinkSelector::Strategy(item.strategy), SinkSelector::Any];
        for selector in selectors {
            let Some(sinks) = self.sinks.get(&selector) else {
                continue;
            };
            for sink in sinks {
                if let Err(err) = sink.deliver(item) {
                    error!(
                        sink = sink.name(),
                        task_id = %item.task.task_id,
                        error = %err,
                        "sink failed; continuing with remaining sinks"
                    );
                }
            }
        }
    }
}
