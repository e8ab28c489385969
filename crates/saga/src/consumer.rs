//! Inbound message demultiplexer.
//!
//! Maps decoded order, payment, and inventory messages onto saga steps. A
//! message without an order id is dropped with a warning; a status this
//! service does not act on is ignored.

use common::OrderId;
use common::contract::{
    InventoryEventMessage, InventoryEventStatus, OrderEventMessage, OrderEventStatus,
    PaymentEventMessage, PaymentEventStatus, topics,
};

use crate::error::SagaError;
use crate::orchestrator::{SagaEventHandler, SagaStep};

/// Why a message was not routed to a saga step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscardReason {
    MissingOrderId,
    UnknownStatus(String),
}

/// What the consumer did with a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    Handled(SagaStep),
    Discarded(DiscardReason),
}

/// Routes inbound messages to a [`SagaEventHandler`].
pub struct SagaEventConsumer<H: SagaEventHandler> {
    handler: H,
}

impl<H: SagaEventHandler> SagaEventConsumer<H> {
    pub fn new(handler: H) -> Self {
        Self { handler }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// `ORDER_CREATED` starts the saga. Other statuses are ignored.
    pub async fn handle_order_event(
        &self,
        message: &OrderEventMessage,
    ) -> Result<Dispatch, SagaError> {
        let Some(order_id) = message.order_id() else {
            return Ok(discard_missing_id(topics::ORDER_EVENTS, message.status.as_str()));
        };

        match &message.status {
            OrderEventStatus::OrderCreated => {
                self.handler.on_order_created(order_id).await?;
                Ok(Dispatch::Handled(SagaStep::OrderCreated))
            }
            OrderEventStatus::Other(raw) => Ok(ignore(topics::ORDER_EVENTS, order_id, raw)),
        }
    }

    pub async fn handle_payment_event(
        &self,
        message: &PaymentEventMessage,
    ) -> Result<Dispatch, SagaError> {
        let Some(order_id) = message.order_id() else {
            return Ok(discard_missing_id(
                topics::PAYMENT_EVENTS,
                message.status.as_str(),
            ));
        };

        match &message.status {
            PaymentEventStatus::PaymentCompleted => {
                self.handler.on_payment_completed(order_id).await?;
                Ok(Dispatch::Handled(SagaStep::PaymentCompleted))
            }
            PaymentEventStatus::PaymentFailed => {
                self.handler.on_payment_failed(order_id).await?;
                Ok(Dispatch::Handled(SagaStep::PaymentFailed))
            }
            PaymentEventStatus::Other(raw) => Ok(ignore(topics::PAYMENT_EVENTS, order_id, raw)),
        }
    }

    pub async fn handle_inventory_event(
        &self,
        message: &InventoryEventMessage,
    ) -> Result<Dispatch, SagaError> {
        let Some(order_id) = message.order_id() else {
            return Ok(discard_missing_id(
                topics::INVENTORY_EVENTS,
                message.status.as_str(),
            ));
        };

        match &message.status {
            InventoryEventStatus::InventoryReserved => {
                self.handler.on_inventory_reserved(order_id).await?;
                Ok(Dispatch::Handled(SagaStep::InventoryReserved))
            }
            InventoryEventStatus::InventoryRejected => {
                self.handler.on_inventory_rejected(order_id).await?;
                Ok(Dispatch::Handled(SagaStep::InventoryRejected))
            }
            InventoryEventStatus::Other(raw) => {
                Ok(ignore(topics::INVENTORY_EVENTS, order_id, raw))
            }
        }
    }
}

fn discard_missing_id(topic: &'static str, status: &str) -> Dispatch {
    metrics::counter!("saga_messages_discarded_total", "topic" => topic).increment(1);
    tracing::warn!(topic, status, "Discarding message without order id");
    Dispatch::Discarded(DiscardReason::MissingOrderId)
}

fn ignore(topic: &'static str, order_id: OrderId, status: &str) -> Dispatch {
    tracing::debug!(topic, %order_id, status, "Ignoring message with unhandled status");
    Dispatch::Discarded(DiscardReason::UnknownStatus(status.to_string()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use common::contract::{InventoryRequestDto, OrderRequestDto, PaymentRequestDto};
    use tokio::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct RecordingHandler {
        calls: Arc<Mutex<Vec<(SagaStep, OrderId)>>>,
        fail: bool,
    }

    impl RecordingHandler {
        async fn record(&self, step: SagaStep, order_id: OrderId) -> Result<(), SagaError> {
            if self.fail {
                return Err(SagaError::OrderNotFound(order_id));
            }
            self.calls.lock().await.push((step, order_id));
            Ok(())
        }
    }

    #[async_trait]
    impl SagaEventHandler for RecordingHandler {
        async fn on_order_created(&self, order_id: OrderId) -> Result<(), SagaError> {
            self.record(SagaStep::OrderCreated, order_id).await
        }

        async fn on_payment_completed(&self, order_id: OrderId) -> Result<(), SagaError> {
            self.record(SagaStep::PaymentCompleted, order_id).await
        }

        async fn on_payment_failed(&self, order_id: OrderId) -> Result<(), SagaError> {
            self.record(SagaStep::PaymentFailed, order_id).await
        }

        async fn on_inventory_reserved(&self, order_id: OrderId) -> Result<(), SagaError> {
            self.record(SagaStep::InventoryReserved, order_id).await
        }

        async fn on_inventory_rejected(&self, order_id: OrderId) -> Result<(), SagaError> {
            self.record(SagaStep::InventoryRejected, order_id).await
        }
    }

    fn payment(order_id: Option<OrderId>, status: PaymentEventStatus) -> PaymentEventMessage {
        PaymentEventMessage {
            payment_request: Some(PaymentRequestDto {
                order_id,
                user_id: 1,
                product_id: 2,
                amount: 10.0,
            }),
            status,
        }
    }

    fn inventory(
        order_id: Option<OrderId>,
        status: InventoryEventStatus,
    ) -> InventoryEventMessage {
        InventoryEventMessage {
            inventory_request: Some(InventoryRequestDto {
                order_id,
                user_id: 1,
                product_id: 2,
            }),
            status,
        }
    }

    #[tokio::test]
    async fn routes_each_known_status() {
        let consumer = SagaEventConsumer::new(RecordingHandler::default());
        let order_id = OrderId::new();

        let created = OrderEventMessage {
            order_request: Some(OrderRequestDto {
                user_id: 1,
                product_id: 2,
                amount: 10.0,
                order_id: Some(order_id),
            }),
            status: OrderEventStatus::OrderCreated,
        };
        let outcomes = vec![
            consumer.handle_order_event(&created).await.unwrap(),
            consumer
                .handle_payment_event(&payment(Some(order_id), PaymentEventStatus::PaymentCompleted))
                .await
                .unwrap(),
            consumer
                .handle_payment_event(&payment(Some(order_id), PaymentEventStatus::PaymentFailed))
                .await
                .unwrap(),
            consumer
                .handle_inventory_event(&inventory(
                    Some(order_id),
                    InventoryEventStatus::InventoryReserved,
                ))
                .await
                .unwrap(),
            consumer
                .handle_inventory_event(&inventory(
                    Some(order_id),
                    InventoryEventStatus::InventoryRejected,
                ))
                .await
                .unwrap(),
        ];

        let expected = [
            SagaStep::OrderCreated,
            SagaStep::PaymentCompleted,
            SagaStep::PaymentFailed,
            SagaStep::InventoryReserved,
            SagaStep::InventoryRejected,
        ];
        assert_eq!(
            outcomes,
            expected.iter().map(|s| Dispatch::Handled(*s)).collect::<Vec<_>>()
        );
        let calls = consumer.handler().calls.lock().await.clone();
        assert_eq!(
            calls,
            expected.iter().map(|s| (*s, order_id)).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn missing_order_id_is_discarded() {
        let consumer = SagaEventConsumer::new(RecordingHandler::default());

        let no_id = consumer
            .handle_payment_event(&payment(None, PaymentEventStatus::PaymentCompleted))
            .await
            .unwrap();
        let no_request = consumer
            .handle_inventory_event(&InventoryEventMessage {
                inventory_request: None,
                status: InventoryEventStatus::InventoryRejected,
            })
            .await
            .unwrap();
        let no_order = consumer
            .handle_order_event(&OrderEventMessage {
                order_request: None,
                status: OrderEventStatus::OrderCreated,
            })
            .await
            .unwrap();

        for outcome in [no_id, no_request, no_order] {
            assert_eq!(outcome, Dispatch::Discarded(DiscardReason::MissingOrderId));
        }
        assert!(consumer.handler().calls.lock().await.is_empty());
    }

    #[tokio::test]
    async fn unknown_status_is_ignored() {
        let consumer = SagaEventConsumer::new(RecordingHandler::default());

        let outcome = consumer
            .handle_payment_event(&payment(
                Some(OrderId::new()),
                PaymentEventStatus::Other("PAYMENT_AUDITED".to_string()),
            ))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            Dispatch::Discarded(DiscardReason::UnknownStatus("PAYMENT_AUDITED".to_string()))
        );
        assert!(consumer.handler().calls.lock().await.is_empty());
    }

    #[tokio::test]
    async fn handler_errors_propagate() {
        let consumer = SagaEventConsumer::new(RecordingHandler {
            fail: true,
            ..Default::default()
        });

        let err = consumer
            .handle_inventory_event(&inventory(
                Some(OrderId::new()),
                InventoryEventStatus::InventoryReserved,
            ))
            .await
            .unwrap_err();

        assert!(err.is_not_found());
    }
}
