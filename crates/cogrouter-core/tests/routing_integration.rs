//! End-to-end routing scenarios: the full loop from telemetry and context
//! through the policy to sinks and the workflow queue feedback.

use std::sync::Arc;

use chrono::Utc;
use cogrouter_core::{
    AttentionContext, AttentionModel, EventBus, InMemoryEventBus, QueueAwareContextProvider,
    RouterService, RoutingPolicy, SensitivityTag, SinkSelector, StaticContextProvider, Strategy,
    TaskIntent, TelemetryCollector, WorkItem, WorkflowEngine, TOPIC_WORK_ITEM,
};

fn default_router() -> RouterService {
    RouterService::new(
        TelemetryCollector::default(),
        AttentionModel::new(),
        RoutingPolicy::default(),
    )
}

fn route_with_load(task: &TaskIntent, load: f64) -> WorkItem {
    RoutingPolicy::default()
        .route(task, load, 0, Utc::now())
        .unwrap()
}

#[test]
fn auto_safe_path_wins_over_overload() {
    let task = TaskIntent::new("auto-1", 2, 30.0, 0.92, "cache eviction drift").unwrap();
    let item = route_with_load(&task, 0.8);
    assert_eq!(item.strategy, Strategy::Auto);
}

#[test]
fn critical_task_interrupts_free_operator() {
    let task = TaskIntent::new("crit-1", 5, 5.0, 0.40, "checkout error spike").unwrap();
    let item = route_with_load(&task, 0.2);
    assert_eq!(item.strategy, Strategy::Immediate);
    assert!(item.priority >= 0.75);
}

#[test]
fn medium_task_batches() {
    let task = TaskIntent::new("med-1", 3, 25.0, 0.65, "latency regression").unwrap();
    let item = route_with_load(&task, 0.4);
    assert_eq!(item.strategy, Strategy::Batch);
    assert!(item.priority >= 0.45 && item.priority < 0.75);
}

#[test]
fn overloaded_operator_parks_deferrable_work() {
    let task = TaskIntent::new("park-1", 2, 40.0, 0.5, "config drift").unwrap();
    let item = route_with_load(&task, 0.85);
    assert_eq!(item.strategy, Strategy::Park);
    assert!(item.rationale.detail.contains("park_load_threshold"));
}

#[test]
fn regulated_work_is_never_parked_under_load() {
    let task = TaskIntent::new("reg-1", 2, 40.0, 0.5, "config drift")
        .unwrap()
        .with_sensitivity(SensitivityTag::Regulated);
    let item = route_with_load(&task, 0.85);
    assert_eq!(item.strategy, Strategy::Batch);
}

#[test]
fn queue_feedback_raises_load_across_submissions() {
    let now = Utc::now();
    let mut router = default_router();
    let engine = Arc::new(WorkflowEngine::new());
    router.register_provider(Box::new(QueueAwareContextProvider::new(engine.clone())));
    router.register_sink(SinkSelector::Strategy(Strategy::Immediate), engine.clone());
    router.register_sink(SinkSelector::Strategy(Strategy::Batch), engine.clone());

    let mut items = Vec::new();
    for n in 1..=3 {
        let task = TaskIntent::new(
            format!("feedback-{n}"),
            3,
            25.0,
            0.65,
            "batchable follow-up",
        )
        .unwrap();
        items.push(router.handle_task_at(&task, now).unwrap());
    }

    for item in &items {
        assert_eq!(item.strategy, Strategy::Batch);
    }
    assert_eq!(items[0].queue_depth, 0);
    assert!(items[2].queue_depth >= 2);
    assert!(items[2].attention_load > items[0].attention_load);
    assert_eq!(engine.depth(Some(Strategy::Batch)), 3);
}

#[test]
fn exactly_one_strategy_and_deterministic_decisions() {
    let task = TaskIntent::new("det-1", 4, 12.0, 0.55, "repeatable").unwrap();
    let policy = RoutingPolicy::default();
    let now = Utc::now();
    let a = policy.route(&task, 0.3, 1, now).unwrap();
    let b = policy.route(&task, 0.3, 1, now).unwrap();
    assert_eq!(a, b);
}

#[test]
fn bus_wired_router_emits_work_items() {
    // Ingress arrives as JSON on the bus; the work item goes back out on
    // the egress topic with its rationale attached.
    let mut bus = InMemoryEventBus::new();
    let mut router = default_router();

    let emitted: Arc<std::sync::Mutex<Vec<WorkItem>>> =
        Arc::new(std::sync::Mutex::new(Vec::new()));
    let seen = emitted.clone();
    bus.subscribe(
        TOPIC_WORK_ITEM,
        Box::new(move |message| {
            let item: WorkItem = serde_json::from_value(message.clone()).unwrap();
            seen.lock().unwrap().push(item);
            Ok(())
        }),
    );

    let message = serde_json::json!({
        "task_id": "bus-1",
        "severity": 5,
        "slo_risk_minutes": 5.0,
        "model_confidence": 0.4,
        "explanation": "paging storm",
        "unknown_field": "tolerated"
    });
    let task = TaskIntent::from_message(&message).unwrap();
    let item = router.handle_task(&task).unwrap();
    bus.publish(TOPIC_WORK_ITEM, &item.to_message().unwrap()).unwrap();

    let emitted = emitted.lock().unwrap();
    assert_eq!(emitted.len(), 1);
    assert_eq!(emitted[0], item);
    assert_eq!(emitted[0].strategy, Strategy::Immediate);
    assert!(!emitted[0].rationale.terms.is_empty());
}

#[test]
fn busy_calendar_shifts_a_borderline_decision() {
    let now = Utc::now();
    let task = TaskIntent::new("cal-1", 2, 40.0, 0.5, "routine anomaly").unwrap();

    let mut calm_router = default_router();
    let calm = calm_router.handle_task_at(&task, now).unwrap();

    let mut busy_router = default_router();
    busy_router.register_provider(Box::new(StaticContextProvider::new(AttentionContext {
        queue_depth: 10,
        calendar_load: 1.0,
        context_switch_rate: 9.0,
    })));
    // Heavy typing on top of a packed calendar pushes load past the park
    // threshold.
    busy_router
        .record_sample(
            cogrouter_core::TelemetrySample::new(now, 3600, 120, 0, 0.0).unwrap(),
        )
        .unwrap();
    let busy = busy_router.handle_task_at(&task, now).unwrap();

    assert!(busy.attention_load > calm.attention_load);
    assert_eq!(busy.strategy, Strategy::Park);
}
