//! Topic-based message bus.
//!
//! Delivery is at-most-once per subscriber and ordered per topic. A
//! subscriber only sees messages published after it subscribed.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::{RwLock, broadcast};
use uuid::Uuid;

use crate::error::{MessagingError, Result};

/// Messages buffered per topic before slow subscribers start lagging.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Published messages kept for inspection, across all topics.
pub const DEFAULT_HISTORY_LIMIT: usize = 1024;

/// A JSON message on a topic.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: Uuid,
    pub topic: String,
    /// Partition key; the order id for every message this system produces.
    pub key: Option<String>,
    pub payload: serde_json::Value,
    pub published_at: DateTime<Utc>,
}

impl Message {
    pub fn new(topic: impl Into<String>, key: Option<String>, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic: topic.into(),
            key,
            payload,
            published_at: Utc::now(),
        }
    }

    /// Serializes `body` into a new message.
    pub fn json<T: Serialize>(
        topic: impl Into<String>,
        key: Option<String>,
        body: &T,
    ) -> Result<Self> {
        Ok(Self::new(topic, key, serde_json::to_value(body)?))
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(T::deserialize(&self.payload)?)
    }
}

/// Publish/subscribe over named topics.
#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn publish(&self, message: Message) -> Result<()>;

    async fn subscribe(&self, topic: &str) -> Result<Subscription>;
}

#[async_trait]
impl<T: MessageBus + ?Sized> MessageBus for Arc<T> {
    async fn publish(&self, message: Message) -> Result<()> {
        (**self).publish(message).await
    }

    async fn subscribe(&self, topic: &str) -> Result<Subscription> {
        (**self).subscribe(topic).await
    }
}

/// Receiving end of a topic.
pub struct Subscription {
    topic: String,
    receiver: broadcast::Receiver<Message>,
}

impl Subscription {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Next message, or `None` once the bus is gone. Messages dropped because
    /// this subscriber lagged are logged and skipped.
    pub async fn recv(&mut self) -> Option<Message> {
        loop {
            match self.receiver.recv().await {
                Ok(message) => return Some(message),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    metrics::counter!("bus_messages_lagged_total", "topic" => self.topic.clone())
                        .increment(skipped);
                    tracing::warn!(topic = %self.topic, skipped, "Subscriber lagged, messages lost");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[derive(Debug, Default)]
struct InMemoryBusState {
    topics: HashMap<String, broadcast::Sender<Message>>,
    history: VecDeque<Message>,
    fail_on_publish: bool,
}

/// In-process bus built on one tokio broadcast channel per topic.
///
/// Keeps the most recent published messages so tests can inspect what went
/// out. Older ones are dropped once `history_limit` is reached; a limit of 0
/// turns the history off.
#[derive(Debug, Clone)]
pub struct InMemoryMessageBus {
    state: Arc<RwLock<InMemoryBusState>>,
    capacity: usize,
    history_limit: usize,
}

impl Default for InMemoryMessageBus {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl InMemoryMessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Arc::new(RwLock::new(InMemoryBusState::default())),
            capacity: capacity.max(1),
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Makes every following publish fail.
    pub async fn set_fail_on_publish(&self, fail: bool) {
        self.state.write().await.fail_on_publish = fail;
    }

    /// Retained messages published to `topic`, oldest first.
    pub async fn published(&self, topic: &str) -> Vec<Message> {
        self.state
            .read()
            .await
            .history
            .iter()
            .filter(|m| m.topic == topic)
            .cloned()
            .collect()
    }

    /// Payloads published to `topic`, decoded as `T`.
    pub async fn published_as<T: DeserializeOwned>(&self, topic: &str) -> Result<Vec<T>> {
        self.published(topic)
            .await
            .iter()
            .map(Message::decode)
            .collect()
    }

    pub async fn subscriber_count(&self, topic: &str) -> usize {
        self.state
            .read()
            .await
            .topics
            .get(topic)
            .map_or(0, broadcast::Sender::receiver_count)
    }

    pub async fn clear(&self) {
        self.state.write().await.history.clear();
    }
}

#[async_trait]
impl MessageBus for InMemoryMessageBus {
    async fn publish(&self, message: Message) -> Result<()> {
        let mut state = self.state.write().await;
        if state.fail_on_publish {
            return Err(MessagingError::PublishFailed {
                topic: message.topic,
                reason: "bus unavailable".to_string(),
            });
        }

        let capacity = self.capacity;
        let sender = state
            .topics
            .entry(message.topic.clone())
            .or_insert_with(|| broadcast::channel(capacity).0);

        // No subscribers is not an error; the message is still recorded.
        let delivered = sender.send(message.clone()).unwrap_or(0);
        tracing::debug!(topic = %message.topic, key = ?message.key, delivered, "Message published");
        metrics::counter!("bus_messages_published_total", "topic" => message.topic.clone())
            .increment(1);

        if self.history_limit > 0 {
            if state.history.len() == self.history_limit {
                state.history.pop_front();
            }
            state.history.push_back(message);
        }
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<Subscription> {
        let mut state = self.state.write().await;
        let capacity = self.capacity;
        let receiver = state
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(capacity).0)
            .subscribe();

        Ok(Subscription {
            topic: topic.to_string(),
            receiver,
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn subscribers_receive_messages_on_their_topic() {
        let bus = InMemoryMessageBus::new();
        let mut orders = bus.subscribe("order-events").await.unwrap();
        let mut payments = bus.subscribe("payment-events").await.unwrap();

        bus.publish(Message::new("order-events", None, json!({"n": 1})))
            .await
            .unwrap();
        bus.publish(Message::new("payment-events", None, json!({"n": 2})))
            .await
            .unwrap();

        assert_eq!(orders.recv().await.unwrap().payload, json!({"n": 1}));
        assert_eq!(payments.recv().await.unwrap().payload, json!({"n": 2}));
        assert_eq!(orders.topic(), "order-events");
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_recorded() {
        let bus = InMemoryMessageBus::new();

        bus.publish(Message::new("lonely", Some("k".to_string()), json!(true)))
            .await
            .unwrap();

        let published = bus.published("lonely").await;
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].key.as_deref(), Some("k"));
        assert!(bus.published("other").await.is_empty());
    }

    #[tokio::test]
    async fn every_subscriber_gets_its_own_copy() {
        let bus = InMemoryMessageBus::new();
        let mut first = bus.subscribe("t").await.unwrap();
        let mut second = bus.subscribe("t").await.unwrap();
        assert_eq!(bus.subscriber_count("t").await, 2);

        bus.publish(Message::new("t", None, json!(1))).await.unwrap();
        bus.publish(Message::new("t", None, json!(2))).await.unwrap();

        for sub in [&mut first, &mut second] {
            assert_eq!(sub.recv().await.unwrap().payload, json!(1));
            assert_eq!(sub.recv().await.unwrap().payload, json!(2));
        }
    }

    #[tokio::test]
    async fn history_keeps_only_the_latest_messages() {
        let bus = InMemoryMessageBus::new().with_history_limit(3);

        for n in 0..5 {
            bus.publish(Message::new("t", None, json!(n))).await.unwrap();
        }

        let kept: Vec<_> = bus.published("t").await.into_iter().map(|m| m.payload).collect();
        assert_eq!(kept, vec![json!(2), json!(3), json!(4)]);
    }

    #[tokio::test]
    async fn zero_history_limit_records_nothing() {
        let bus = InMemoryMessageBus::new().with_history_limit(0);
        let mut sub = bus.subscribe("t").await.unwrap();

        bus.publish(Message::new("t", None, json!(1))).await.unwrap();

        assert_eq!(sub.recv().await.unwrap().payload, json!(1));
        assert!(bus.published("t").await.is_empty());
    }

    #[tokio::test]
    async fn lagging_subscriber_skips_lost_messages() {
        let bus = InMemoryMessageBus::with_capacity(2);
        let mut sub = bus.subscribe("t").await.unwrap();

        for n in 0..5 {
            bus.publish(Message::new("t", None, json!(n))).await.unwrap();
        }

        assert_eq!(sub.recv().await.unwrap().payload, json!(3));
        assert_eq!(sub.recv().await.unwrap().payload, json!(4));
    }

    #[tokio::test]
    async fn failure_toggle() {
        let bus = InMemoryMessageBus::new();
        bus.set_fail_on_publish(true).await;

        let err = bus
            .publish(Message::new("t", None, json!(null)))
            .await
            .unwrap_err();

        assert!(matches!(err, MessagingError::PublishFailed { .. }));
        assert!(bus.published("t").await.is_empty());
    }

    #[test]
    fn json_round_trip_through_message() {
        #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
        struct Body {
            value: i32,
        }

        let message = Message::json("t", None, &Body { value: 7 }).unwrap();

        assert_eq!(message.payload, json!({"value": 7}));
        assert_eq!(message.decode::<Body>().unwrap(), Body { value: 7 });
        assert!(message.decode::<Vec<u8>>().is_err());
    }
}
