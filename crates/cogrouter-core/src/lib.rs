//! # Cogrouter Core Library
//!
//! Routing engine that decides, per incoming AI-agent or monitoring task,
//! whether to interrupt a human operator now, queue the task for batched
//! review, auto-resolve it, or park it for later. The decision combines
//! task urgency, model certainty, and a live estimate of the operator's
//! cognitive bandwidth.
//!
//! ## Key components
//!
//! - [`TelemetryCollector`]: rolling-window aggregation of interaction samples
//! - [`ContextProvider`]: pluggable availability signals (queue, calendar, churn)
//! - [`AttentionModel`]: pure telemetry + context to load-scalar mapping
//! - [`RoutingPolicy`]: priority scoring and the four-way strategy decision
//! - [`RouterService`]: orchestration and sink dispatch
//! - [`WorkflowEngine`]: per-strategy queues feeding depth back into context
//! - [`evaluator`] / [`optimizer`]: offline replay, sweeps, and grid search
//!
//! The core is in-memory and synchronous; one logical owner drives a
//! router instance. Persistence, transports, and vendor adapters live
//! behind the narrow traits defined here.

pub mod attention;
pub mod bus;
pub mod context;
pub mod error;
pub mod evaluator;
pub mod optimizer;
pub mod policy;
pub mod router;
pub mod simulation;
pub mod task;
pub mod telemetry;
pub mod workflow;

pub use attention::{AttentionConfig, AttentionModel};
pub use bus::{
    BrokerConsumer, BrokerEventBus, BrokerProducer, BrokerRecord, BusHandler, BusMessage,
    EventBus, InMemoryEventBus, Subscription, TOPIC_TASK_INTENT, TOPIC_WORK_ITEM,
};
pub use context::{
    AttentionContext, CalendarAwareContextProvider, CalendarSource, CallableContextProvider,
    CompositeContextProvider, ContextProvider, QueueAwareContextProvider, StaticContextProvider,
};
pub use error::{ConfigError, Result, RouterError};
pub use evaluator::{
    evaluate, evaluate_labeled, load_records, load_sweep, sweep, Baseline, HistoricalRecord,
    Report, SweepEntry,
};
pub use optimizer::{load_grid, optimize, Objective, OptimizationOutcome, PolicyGrid};
pub use policy::{PolicyBuilder, PolicyOverrides, RoutingPolicy};
pub use router::{RouterService, SinkSelector, WorkSink};
pub use simulation::{run_simulation, SimRng, SimulationConfig, SimulationOutcome};
pub use task::{
    Rationale, RationaleTerm, RoutingRule, SensitivityTag, Strategy, TaskIntent, WorkItem,
};
pub use telemetry::{TelemetryCollector, TelemetrySample, TelemetrySummary};
pub use workflow::{OrchestratorAdapter, OrchestratorClient, WorkflowEngine};
