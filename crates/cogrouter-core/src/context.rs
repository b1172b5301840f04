//! Context providers exposing operator availability signals.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Result, RouterError};
use crate::workflow::WorkflowEngine;

/// Availability signals beyond raw interaction telemetry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AttentionContext {
    #[serde(default)]
    pub queue_depth: u32,
    /// Calendar occupancy ratio in [0, 1].
    #[serde(default)]
    pub calendar_load: f64,
    /// Context switches per minute.
    #[serde(default)]
    pub context_switch_rate: f64,
}

impl AttentionContext {
    /// Combine two contexts: queue depth and calendar load take the
    /// maximum, switch rates add. These rules are contractual.
    pub fn merge(self, other: AttentionContext) -> AttentionContext {
        AttentionContext {
            queue_depth: self.queue_depth.max(other.queue_depth),
            calendar_load: self.calendar_load.max(other.calendar_load),
            context_switch_rate: self.context_switch_rate + other.context_switch_rate,
        }
    }
}

/// Every availability source implements this trait. Implementations must
/// not panic; failures are reported through the `Result` and absorbed to a
/// zero context by whoever composes providers.
pub trait ContextProvider: Send + Sync {
    /// Identifier used in warning logs.
    fn name(&self) -> &str;

    fn snapshot(&self, now: DateTime<Utc>) -> Result<AttentionContext>;
}

/// Returns a fixed context.
#[derive(Debug, Clone)]
pub struct StaticContextProvider {
    context: AttentionContext,
}

impl StaticContextProvider {
    pub fn new(context: AttentionContext) -> Self {
        Self { context }
    }
}

impl ContextProvider for StaticContextProvider {
    fn name(&self) -> &str {
        "static"
    }

    fn snapshot(&self, _now: DateTime<Utc>) -> Result<AttentionContext> {
        Ok(self.context)
    }
}

type ContextFn = dyn Fn(DateTime<Utc>) -> Result<AttentionContext> + Send + Sync;

/// Delegates to a supplied closure.
pub struct CallableContextProvider {
    name: String,
    producer: Box<ContextFn>,
}

impl CallableContextProvider {
    pub fn new(
        name: impl Into<String>,
        producer: impl Fn(DateTime<Utc>) -> Result<AttentionContext> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            producer: Box::new(producer),
        }
    }
}

impl ContextProvider for CallableContextProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn snapshot(&self, now: DateTime<Utc>) -> Result<AttentionContext> {
        (self.producer)(now)
    }
}

/// Reads the current backlog depth from a workflow engine, closing the
/// feedback loop between accepted work and future routing decisions.
pub struct QueueAwareContextProvider {
    engine: Arc<WorkflowEngine>,
}

impl QueueAwareContextProvider {
    pub fn new(engine: Arc<WorkflowEngine>) -> Self {
        Self { engine }
    }
}

impl ContextProvider for QueueAwareContextProvider {
    fn name(&self) -> &str {
        "queue_depth"
    }

    fn snapshot(&self, _now: DateTime<Utc>) -> Result<AttentionContext> {
        Ok(AttentionContext {
            queue_depth: self.engine.depth(None) as u32,
            ..AttentionContext::default()
        })
    }
}

/// External calendar lookup. Implementations may perform I/O; errors are
/// mapped to `ProviderFailure` and absorbed upstream.
pub trait CalendarSource: Send + Sync {
    fn busy_minutes_next_hour(&self, now: DateTime<Utc>) -> Result<f64>;
}

/// Reports calendar occupancy for the next hour as a load ratio.
pub struct CalendarAwareContextProvider {
    source: Box<dyn CalendarSource>,
}

impl CalendarAwareContextProvider {
    pub fn new(source: Box<dyn CalendarSource>) -> Self {
        Self { source }
    }
}

impl ContextProvider for CalendarAwareContextProvider {
    fn name(&self) -> &str {
        "calendar"
    }

    fn snapshot(&self, now: DateTime<Utc>) -> Result<AttentionContext> {
        let minutes = self
            .source
            .busy_minutes_next_hour(now)
            .map_err(|err| RouterError::Provider {
                provider: "calendar".to_string(),
                message: err.to_string(),
            })?;
        Ok(AttentionContext {
            calendar_load: (minutes / 60.0).clamp(0.0, 1.0),
            ..AttentionContext::default()
        })
    }
}

/// Combines child providers: queue depth and calendar load by maximum,
/// switch rates by sum. A failing child contributes a zero context and is
/// logged; the composite itself never fails.
pub struct CompositeContextProvider {
    providers: Vec<Box<dyn ContextProvider>>,
}

impl CompositeContextProvider {
    pub fn new(providers: Vec<Box<dyn ContextProvider>>) -> Self {
        Self { providers }
    }

    pub fn add(&mut self, provider: Box<dyn ContextProvider>) {
        self.providers.push(provider);
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl ContextProvider for CompositeContextProvider {
    fn name(&self) -> &str {
        "composite"
    }

    fn snapshot(&self, now: DateTime<Utc>) -> Result<AttentionContext> {
        let mut merged = AttentionContext::default();
        for provider in &self.providers {
            match provider.snapshot(now) {
                Ok(context) => merged = merged.merge(context),
                Err(err) => {
                    warn!(provider = provider.name(), error = %err, "context provider failed; using zero context");
                }
            }
        }
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed(queue_depth: u32, calendar_load: f64, switch_rate: f64) -> Box<dyn ContextProvider> {
        Box::new(StaticContextProvider::new(AttentionContext {
            queue_depth,
            calendar_load,
            context_switch_rate: switch_rate,
        }))
    }

    #[test]
    fn test_composite_combination_rules() {
        let composite = CompositeContextProvider::new(vec![
            fixed(3, 0.2, 1.0),
            fixed(7, 0.1, 2.5),
            fixed(1, 0.6, 0.0),
        ]);
        let ctx = composite.snapshot(Utc::now()).unwrap();
        assert_eq!(ctx.queue_depth, 7);
        assert!((ctx.calendar_load - 0.6).abs() < 1e-9);
        assert!((ctx.context_switch_rate - 3.5).abs() < 1e-9);
    }

    #[test]
    fn test_adding_a_provider_never_lowers_signals() {
        let mut composite = CompositeContextProvider::new(vec![fixed(4, 0.5, 1.0)]);
        let before = composite.snapshot(Utc::now()).unwrap();
        composite.add(fixed(2, 0.1, 0.5));
        let after = composite.snapshot(Utc::now()).unwrap();
        assert!(after.queue_depth >= before.queue_depth);
        assert!(after.calendar_load >= before.calendar_load);
    }

    #[test]
    fn test_failing_child_is_absorbed() {
        let failing = CallableContextProvider::new("flaky", |_| {
            Err(RouterError::Provider {
                provider: "flaky".to_string(),
                message: "connection refused".to_string(),
            })
        });
        let composite =
            CompositeContextProvider::new(vec![Box::new(failing), fixed(2, 0.3, 1.0)]);
        let ctx = composite.snapshot(Utc::now()).unwrap();
        assert_eq!(ctx.queue_depth, 2);
        assert!((ctx.calendar_load - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_calendar_provider_clamps_ratio() {
        struct BusySource;
        impl CalendarSource for BusySource {
            fn busy_minutes_next_hour(&self, _now: DateTime<Utc>) -> Result<f64> {
                Ok(90.0)
            }
        }
        let provider = CalendarAwareContextProvider::new(Box::new(BusySource));
        let ctx = provider.snapshot(Utc::now()).unwrap();
        assert!((ctx.calendar_load - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_callable_provider_passes_now() {
        let provider = CallableContextProvider::new("clock", |now: DateTime<Utc>| {
            Ok(AttentionContext {
                queue_depth: now.timestamp().is_positive() as u32,
                ..AttentionContext::default()
            })
        });
        let ctx = provider.snapshot(Utc::now()).unwrap();
        assert_eq!(ctx.queue_depth, 1);
    }
}
