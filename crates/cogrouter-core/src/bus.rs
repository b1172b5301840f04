//! Topic-keyed publish/subscribe, in-memory and broker-backed.

use std::collections::HashMap;

use tracing::warn;

use crate::error::{Result, RouterError};

/// Ingress topic carrying task intents.
pub const TOPIC_TASK_INTENT: &str = "task_intent";
/// Egress topic carrying routed work items.
pub const TOPIC_WORK_ITEM: &str = "work_item";

/// Messages are structured JSON so unknown fields survive transport.
pub type BusMessage = serde_json::Value;

/// Subscriber callback. Errors are isolated per handler and logged.
pub type BusHandler = Box<dyn FnMut(&BusMessage) -> Result<()>>;

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    topic: String,
    id: u64,
}

impl Subscription {
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

/// Minimal pub/sub surface shared by the in-memory bus and broker
/// adapters.
pub trait EventBus {
    fn subscribe(&mut self, topic: &str, handler: BusHandler) -> Subscription;

    /// Remove a subscription. Returns whether it was still registered.
    fn unsubscribe(&mut self, subscription: &Subscription) -> bool;

    fn publish(&mut self, topic: &str, message: &BusMessage) -> Result<()>;
}

/// Process-local bus: synchronous fan-out in subscription order, at-most-
/// once delivery, per-topic FIFO for a single producer.
#[derive(Default)]
pub struct InMemoryEventBus {
    subscribers: HashMap<String, Vec<(u64, BusHandler)>>,
    next_id: u64,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.subscribers.get(topic).map_or(0, Vec::len)
    }
}

impl EventBus for InMemoryEventBus {
    fn subscribe(&mut self, topic: &str, handler: BusHandler) -> Subscription {
        let id = self.next_id;
        self.next_id += 1;
        self.subscribers
            .entry(topic.to_string())
            .or_default()
            .push((id, handler));
        Subscription {
            topic: topic.to_string(),
            id,
        }
    }

    fn unsubscribe(&mut self, subscription: &Subscription) -> bool {
        let Some(handlers) = self.subscribers.get_mut(&subscription.topic) else {
            return false;
        };
        let before = handlers.len();
        handlers.retain(|(id, _)| *id != subscription.id);
        handlers.len() < before
    }

    fn publish(&mut self, topic: &str, message: &BusMessage) -> Result<()> {
        let Some(handlers) = self.subscribers.get_mut(topic) else {
            return Ok(());
        };
        for (id, handler) in handlers.iter_mut() {
            if let Err(err) = handler(message) {
                warn!(topic, subscription = *id, error = %err, "bus handler failed; continuing fan-out");
            }
        }
        Ok(())
    }
}

/// Producer half of an external broker.
pub trait BrokerProducer {
    fn send(&mut self, topic: &str, payload: &[u8]) -> Result<()>;
}

/// Consumer half of an external broker.
pub trait BrokerConsumer {
    /// Fetch at most one pending record. `Ok(None)` means the queue is
    /// currently drained.
    fn poll(&mut self) -> Result<Option<BrokerRecord>>;
}

/// A single record pulled from a broker.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerRecord {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Wraps a broker producer/consumer pair behind the bus interface.
/// Delivery inherits the transport's semantics (at-least-once brokers
/// stay at-least-once); the host pumps messages with [`poll_once`].
///
/// [`poll_once`]: BrokerEventBus::poll_once
pub struct BrokerEventBus<P, C> {
    producer: P,
    consumer: C,
    local: InMemoryEventBus,
}

impl<P: BrokerProducer, C: BrokerConsumer> BrokerEventBus<P, C> {
    pub fn new(producer: P, consumer: C) -> Self {
        Self {
            producer,
            consumer,
            local: InMemoryEventBus::new(),
        }
    }

    /// Drain up to `max_messages` records from the consumer and dispatch
    /// them through the local subscribers. Returns how many records were
    /// dispatched. Transport failures surface to the caller; the bus
    /// stays usable afterwards.
    pub fn poll_once(&mut self, max_messages: usize) -> Result<usize> {
        let mut dispatched = 0;
        while dispatched < max_messages {
            let Some(record) = self.consumer.poll()? else {
                break;
            };
            let message: BusMessage = serde_json::from_slice(&record.payload)
                .map_err(|err| RouterError::Transport(format!("undecodable payload: {err}")))?;
            self.local.publish(&record.topic, &message)?;
            dispatched += 1;
        }
        Ok(dispatched)
    }
}

impl<P: BrokerProducer, C: BrokerConsumer> EventBus for BrokerEventBus<P, C> {
    fn subscribe(&mut self, topic: &str, handler: BusHandler) -> Subscription {
        self.local.subscribe(topic, handler)
    }

    fn unsubscribe(&mut self, subscription: &Subscription) -> bool {
        self.local.unsubscribe(subscription)
    }

    fn publish(&mut self, topic: &str, message: &BusMessage) -> Result<()> {
        let payload = serde_json::to_vec(message)?;
        self.producer.send(topic, &payload)
    }
}
