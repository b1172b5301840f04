//! Workflow queues for accepted work items.

use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, PoisonError};

use serde_json::json;
use uuid::Uuid;

use crate::error::{Result, RouterError};
use crate::router::WorkSink;
use crate::task::{Strategy, WorkItem};

#[derive(Debug, Default)]
struct EngineState {
    immediate: Vec<WorkItem>,
    batch: VecDeque<WorkItem>,
    /// Auto and park decisions, recorded but never queued for a human.
    resolved: Vec<WorkItem>,
    seen: HashSet<String>,
}

/// In-memory queue of routed work items, one lane per human-facing
/// strategy. Shared behind `Arc`: the router writes through the sink
/// interface while an external consumer drains with `next`/`complete`,
/// and queue-aware context providers read the depth concurrently.
#[derive(Debug, Default)]
pub struct WorkflowEngine {
    state: Mutex<EngineState>,
}

impl WorkflowEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept a routed item. Idempotent on `task_id`: a second accept of
    /// the same task is a no-op. Returns whether the item was new.
    pub fn accept(&self, item: WorkItem) -> bool {
        let mut state = self.lock();
        if !state.seen.insert(item.task.task_id.clone()) {
            return false;
        }
        match item.strategy {
            Strategy::Immediate => state.immediate.push(item),
            Strategy::Batch => state.batch.push_back(item),
            Strategy::Auto | Strategy::Park => state.resolved.push(item),
        }
        true
    }

    /// Current backlog depth. `None` sums the human-facing lanes.
    pub fn depth(&self, strategy: Option<Strategy>) -> usize {
        let state = self.lock();
        match strategy {
            Some(Strategy::Immediate) => state.immediate.len(),
            Some(Strategy::Batch) => state.batch.len(),
            Some(Strategy::Auto) | Some(Strategy::Park) => 0,
            None => state.immediate.len() + state.batch.len(),
        }
    }

    /// Pop the next item for a lane. The immediate lane hands out the
    /// highest-priority item, earliest-accepted among equals; the batch
    /// lane is strict FIFO.
    pub fn next(&self, strategy: Strategy) -> Option<WorkItem> {
        let mut state = self.lock();
        match strategy {
            Strategy::Immediate => {
                let mut best: Option<usize> = None;
                for i in 0..state.immediate.len() {
                    let better = match best {
                        None => true,
                        Some(b) => state.immediate[i].priority > state.immediate[b].priority,
                    };
                    if better {
                        best = Some(i);
                    }
                }
                best.map(|i| state.immediate.remove(i))
            }
            Strategy::Batch => state.batch.pop_front(),
            Strategy::Auto | Strategy::Park => None,
        }
    }

    /// Remove an item from whichever lane holds it. The task id stays
    /// known, so a late duplicate accept remains a no-op.
    pub fn complete(&self, task_id: &str) -> bool {
        let mut state = self.lock();
        if let Some(pos) = state
            .immediate
            .iter()
            .position(|item| item.task.task_id == task_id)
        {
            state.immediate.remove(pos);
            return true;
        }
        if let Some(pos) = state
            .batch
            .iter()
            .position(|item| item.task.task_id == task_id)
        {
            return state.batch.remove(pos).is_some();
        }
        false
    }

    /// Snapshot the queued items for a lane, in dequeue order.
    pub fn queued_items(&self, strategy: Strategy) -> Vec<WorkItem> {
        let state = self.lock();
        match strategy {
            Strategy::Immediate => state.immediate.clone(),
            Strategy::Batch => state.batch.iter().cloned().collect(),
            Strategy::Auto | Strategy::Park => Vec::new(),
        }
    }

    /// Number of auto/park decisions recorded without queueing.
    pub fn resolved_count(&self) -> usize {
        self.lock().resolved.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl WorkSink for WorkflowEngine {
    fn name(&self) -> &str {
        "workflow"
    }

    fn deliver(&self, item: &WorkItem) -> Result<()> {
        self.accept(item.clone());
        Ok(())
    }
}

/// Client half of an external orchestrator (Temporal-style). The adapter
/// only needs to start a review workflow per accepted item.
pub trait OrchestratorClient: Send + Sync {
    fn start_review(
        &self,
        workflow_id: &str,
        task_queue: &str,
        payload: &serde_json::Value,
    ) -> Result<()>;
}

/// Forwards accepted work items to an external orchestrator instead of
/// holding them locally. Exposes the same sink surface as the in-memory
/// engine.
pub struct OrchestratorAdapter {
    client: Box<dyn OrchestratorClient>,
    task_queue: String,
    id_prefix: String,
}

impl OrchestratorAdapter {
    pub fn new(client: Box<dyn OrchestratorClient>) -> Self {
        Self {
            client,
            task_queue: "human_review".to_string(),
            id_prefix: "router".to_string(),
        }
    }

    pub fn with_task_queue(mut self, task_queue: impl Into<String>) -> Self {
        self.task_queue = task_queue.into();
        self
    }

    pub fn with_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.id_prefix = prefix.into();
        self
    }

    pub fn forward(&self, item: &WorkItem) -> Result<()> {
        let payload = json!({
            "task": item.task,
            "strategy": item.strategy,
            "priority": item.priority,
            "attention_load": item.attention_load,
            "rationale": item.rationale,
        });
        let suffix = Uuid::new_v4().simple().to_string();
        let workflow_id = format!("{}-{}-{}", self.id_prefix, item.task.task_id, &suffix[..8]);
        self.client
            .start_review(&workflow_id, &self.task_queue, &payload)
            .map_err(|err| RouterError::Sink {
                sink: "orchestrator".to_string(),
                task_id: item.task.task_id.clone(),
                message: err.to_string(),
            })
    }
}

impl WorkSink for OrchestratorAdapter {
    fn name(&self) -> &str {
        "orchestrator"
    }

    fn deliver(&self, item: &WorkItem) -> Result<()> {
        self.forward(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Rationale, RationaleTerm, RoutingRule, TaskIntent};
    use chrono::Utc;
    use std::sync::{Arc, Mutex as StdMutex};

    fn item(id: &str, strategy: Strategy, priority: f64) -> WorkItem {
        WorkItem {
            task: TaskIntent::new(id, 3, 20.0, 0.5, "test").unwrap(),
            strategy,
            priority,
            attention_load: 0.2,
            queue_depth: 0,
            rationale: Rationale {
                terms: vec![RationaleTerm::new("severity", 0.25, 0.6)],
                rule: RoutingRule::PriorityBatch,
                detail: String::new(),
            },
            decided_at: Utc::now(),
        }
    }

    #[test]
    fn test_batch_is_fifo() {
        let engine = WorkflowEngine::new();
        engine.accept(item("a", Strategy::Batch, 0.9));
        engine.accept(item("b", Strategy::Batch, 0.5));
        engine.accept(item("c", Strategy::Batch, 0.7));

        assert_eq!(engine.next(Strategy::Batch).unwrap().task.task_id, "a");
        assert_eq!(engine.next(Strategy::Batch).unwrap().task.task_id, "b");
        assert_eq!(engine.next(Strategy::Batch).unwrap().task.task_id, "c");
        assert!(engine.next(Strategy::Batch).is_none());
    }

    #[test]
    fn test_immediate_prefers_priority_then_arrival() {
        let engine = WorkflowEngine::new();
        engine.accept(item("low", Strategy::Immediate, 0.76));
        engine.accept(item("high", Strategy::Immediate, 0.95));
        engine.accept(item("tied", Strategy::Immediate, 0.95));

        assert_eq!(engine.next(Strategy::Immediate).unwrap().task.task_id, "high");
        assert_eq!(engine.next(Strategy::Immediate).unwrap().task.task_id, "tied");
        assert_eq!(engine.next(Strategy::Immediate).unwrap().task.task_id, "low");
    }

    #[test]
    fn test_accept_is_idempotent_on_task_id() {
        let engine = WorkflowEngine::new();
        assert!(engine.accept(item("a", Strategy::Batch, 0.5)));
        assert!(!engine.accept(item("a", Strategy::Batch, 0.5)));
        assert_eq!(engine.depth(Some(Strategy::Batch)), 1);
    }

    #[test]
    fn test_auto_and_park_are_recorded_not_queued() {
        let engine = WorkflowEngine::new();
        engine.accept(item("a", Strategy::Auto, 0.3));
        engine.accept(item("b", Strategy::Park, 0.2));
        assert_eq!(engine.depth(None), 0);
        assert_eq!(engine.resolved_count(), 2);
        assert!(engine.next(Strategy::Auto).is_none());
    }

    #[test]
    fn test_depth_by_strategy() {
        let engine = WorkflowEngine::new();
        engine.accept(item("a", Strategy::Immediate, 0.9));
        engine.accept(item("b", Strategy::Batch, 0.5));
        engine.accept(item("c", Strategy::Batch, 0.5));
        assert_eq!(engine.depth(Some(Strategy::Immediate)), 1);
        assert_eq!(engine.depth(Some(Strategy::Batch)), 2);
        assert_eq!(engine.depth(None), 3);
    }

    #[test]
    fn test_complete_removes_item() {
        let engine = WorkflowEngine::new();
        engine.accept(item("a", Strategy::Batch, 0.5));
        assert!(engine.complete("a"));
        assert!(!engine.complete("a"));
        assert_eq!(engine.depth(None), 0);
        // Completed ids stay known to keep duplicate accepts inert.
        assert!(!engine.accept(item("a", Strategy::Batch, 0.5)));
    }

    #[test]
    fn test_orchestrator_adapter_forwards_payload() {
        struct RecordingClient {
            calls: Arc<StdMutex<Vec<(String, String)>>>,
        }
        impl OrchestratorClient for RecordingClient {
            fn start_review(
                &self,
                workflow_id: &str,
                task_queue: &str,
                payload: &serde_json::Value,
            ) -> Result<()> {
                assert_eq!(payload["strategy"], "immediate");
                self.calls
                    .lock()
                    .unwrap()
                    .push((workflow_id.to_string(), task_queue.to_string()));
                Ok(())
            }
        }

        let calls = Arc::new(StdMutex::new(Vec::new()));
        let adapter = OrchestratorAdapter::new(Box::new(RecordingClient {
            calls: calls.clone(),
        }))
        .with_task_queue("review");
        adapter.forward(&item("a", Strategy::Immediate, 0.9)).unwrap();

        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].0.starts_with("router-a-"));
        assert_eq!(calls[0].1, "review");
    }
}
