//! Domain event publishing port and in-memory implementation.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::aggregate::DomainEvent;
use crate::order::{OrderEvent, OrderStatus};

#[derive(Debug, Clone, Error)]
#[error("Failed to publish {event_type} event: {reason}")]
pub struct PublishError {
    pub event_type: &'static str,
    pub reason: String,
}

/// Hands drained domain events to the outside world.
#[async_trait]
pub trait DomainEventPublisher: Send + Sync {
    async fn publish(&self, event: &OrderEvent) -> Result<(), PublishError>;

    /// Publishes events in order, stopping at the first failure.
    async fn publish_all(&self, events: &[OrderEvent]) -> Result<(), PublishError> {
        for event in events {
            self.publish(event).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl<T: DomainEventPublisher + ?Sized> DomainEventPublisher for Arc<T> {
    async fn publish(&self, event: &OrderEvent) -> Result<(), PublishError> {
        (**self).publish(event).await
    }
}

#[derive(Debug, Default)]
struct InMemoryPublisherState {
    published: Vec<OrderEvent>,
    fail_on_publish: bool,
}

/// Publisher that records every event, for tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDomainEventPublisher {
    state: Arc<RwLock<InMemoryPublisherState>>,
}

impl InMemoryDomainEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following publish fail.
    pub async fn set_fail_on_publish(&self, fail: bool) {
        self.state.write().await.fail_on_publish = fail;
    }

    pub async fn published(&self) -> Vec<OrderEvent> {
        self.state.read().await.published.clone()
    }

    /// `(previous, new)` of every published status change, in order.
    pub async fn transitions(&self) -> Vec<(OrderStatus, OrderStatus)> {
        self.state
            .read()
            .await
            .published
            .iter()
            .filter_map(OrderEvent::transition)
            .collect()
    }

    pub async fn clear(&self) {
        self.state.write().await.published.clear();
    }
}

#[async_trait]
impl DomainEventPublisher for InMemoryDomainEventPublisher {
    async fn publish(&self, event: &OrderEvent) -> Result<(), PublishError> {
        let mut state = self.state.write().await;
        if state.fail_on_publish {
            return Err(PublishError {
                event_type: event.event_type(),
                reason: "publisher unavailable".to_string(),
            });
        }
        state.published.push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use common::OrderId;

    use super::*;

    fn changed(from: OrderStatus, to: OrderStatus) -> OrderEvent {
        OrderEvent::status_changed(OrderId::new(), from, to, Utc::now())
    }

    #[tokio::test]
    async fn records_events_in_order() {
        let publisher = InMemoryDomainEventPublisher::new();
        publisher
            .publish_all(&[
                changed(OrderStatus::Created, OrderStatus::PaymentPending),
                changed(OrderStatus::PaymentPending, OrderStatus::PaymentCompleted),
            ])
            .await
            .unwrap();

        assert_eq!(publisher.published().await.len(), 2);
        assert_eq!(
            publisher.transitions().await,
            vec![
                (OrderStatus::Created, OrderStatus::PaymentPending),
                (OrderStatus::PaymentPending, OrderStatus::PaymentCompleted),
            ]
        );

        publisher.clear().await;
        assert!(publisher.published().await.is_empty());
    }

    #[tokio::test]
    async fn failure_toggle() {
        let publisher = InMemoryDomainEventPublisher::new();
        publisher.set_fail_on_publish(true).await;

        let err = publisher
            .publish(&changed(OrderStatus::Created, OrderStatus::Cancelled))
            .await
            .unwrap_err();

        assert_eq!(err.event_type, "order.status.changed");
        assert!(publisher.published().await.is_empty());
    }

    #[tokio::test]
    async fn shared_through_arc() {
        let publisher = Arc::new(InMemoryDomainEventPublisher::new());
        let shared: Arc<InMemoryDomainEventPublisher> = Arc::clone(&publisher);

        shared
            .publish(&changed(OrderStatus::Created, OrderStatus::Cancelled))
            .await
            .unwrap();

        assert_eq!(publisher.published().await.len(), 1);
    }
}
