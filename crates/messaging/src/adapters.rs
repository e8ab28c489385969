//! Adapters that put saga commands and order events on the bus.

use async_trait::async_trait;
use common::OrderId;
use common::contract::{
    InventoryRequestDto, OrderEventMessage, OrderEventStatus, OrderRequestDto, PaymentRequestDto,
    REFUND_AMOUNT, REFUND_PRODUCT_ID, RELEASE_USER_ID, topics,
};
use domain::{DomainEvent, DomainEventPublisher, OrderEvent, PublishError};
use saga::{
    InventoryCommandSender, PaymentCommandSender, ProcessPayment, RefundPayment,
    ReleaseInventory, ReserveInventory, SagaError,
};
use serde::Serialize;

use crate::bus::{Message, MessageBus};

async fn send_command<B: MessageBus, T: Serialize>(
    bus: &B,
    topic: &'static str,
    command: &'static str,
    order_id: OrderId,
    body: &T,
) -> Result<(), SagaError> {
    let dispatch_error = |reason: String| SagaError::CommandDispatch {
        command,
        order_id,
        reason,
    };

    let message = Message::json(topic, Some(order_id.to_string()), body)
        .map_err(|e| dispatch_error(e.to_string()))?;
    bus.publish(message)
        .await
        .map_err(|e| dispatch_error(e.to_string()))?;

    metrics::counter!("saga_commands_sent_total", "command" => command).increment(1);
    tracing::debug!(%order_id, topic, command, "Command published");
    Ok(())
}

/// Sends payment commands to `payment-commands-out`.
///
/// A refund travels as a payment request with `amount = 0.0` and
/// `productId = 0`.
#[derive(Debug, Clone)]
pub struct BusPaymentCommandSender<B: MessageBus> {
    bus: B,
}

impl<B: MessageBus> BusPaymentCommandSender<B> {
    pub fn new(bus: B) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl<B: MessageBus> PaymentCommandSender for BusPaymentCommandSender<B> {
    async fn process_payment(&self, cmd: ProcessPayment) -> Result<(), SagaError> {
        if cmd.amount.is_zero() {
            tracing::warn!(
                order_id = %cmd.order_id,
                "Charging a zero amount; the payment service will read it as a refund"
            );
        }

        let body = PaymentRequestDto {
            order_id: Some(cmd.order_id),
            user_id: cmd.user_id.value(),
            product_id: cmd.product_id.value(),
            amount: cmd.amount.to_f64(),
        };
        send_command(
            &self.bus,
            topics::PAYMENT_COMMANDS,
            "ProcessPayment",
            cmd.order_id,
            &body,
        )
        .await
    }

    async fn refund_payment(&self, cmd: RefundPayment) -> Result<(), SagaError> {
        let body = PaymentRequestDto {
            order_id: Some(cmd.order_id),
            user_id: cmd.user_id.value(),
            product_id: REFUND_PRODUCT_ID,
            amount: REFUND_AMOUNT,
        };
        send_command(
            &self.bus,
            topics::PAYMENT_COMMANDS,
            "RefundPayment",
            cmd.order_id,
            &body,
        )
        .await
    }
}

/// Sends inventory commands to `inventory-commands-out`.
///
/// A release travels as an inventory request with `userId = 0`.
#[derive(Debug, Clone)]
pub struct BusInventoryCommandSender<B: MessageBus> {
    bus: B,
}

impl<B: MessageBus> BusInventoryCommandSender<B> {
    pub fn new(bus: B) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl<B: MessageBus> InventoryCommandSender for BusInventoryCommandSender<B> {
    async fn reserve_inventory(&self, cmd: ReserveInventory) -> Result<(), SagaError> {
        let body = InventoryRequestDto {
            order_id: Some(cmd.order_id),
            user_id: cmd.user_id.value(),
            product_id: cmd.product_id.value(),
        };
        send_command(
            &self.bus,
            topics::INVENTORY_COMMANDS,
            "ReserveInventory",
            cmd.order_id,
            &body,
        )
        .await
    }

    async fn release_inventory(&self, cmd: ReleaseInventory) -> Result<(), SagaError> {
        let body = InventoryRequestDto {
            order_id: Some(cmd.order_id),
            user_id: RELEASE_USER_ID,
            product_id: cmd.product_id.value(),
        };
        send_command(
            &self.bus,
            topics::INVENTORY_COMMANDS,
            "ReleaseInventory",
            cmd.order_id,
            &body,
        )
        .await
    }
}

/// Publishes `ORDER_CREATED` to `order-events`, which starts the saga.
///
/// Status changes stay internal and are only logged.
#[derive(Debug, Clone)]
pub struct BusDomainEventPublisher<B: MessageBus> {
    bus: B,
}

impl<B: MessageBus> BusDomainEventPublisher<B> {
    pub fn new(bus: B) -> Self {
        Self { bus }
    }
}

#[async_trait]
impl<B: MessageBus> DomainEventPublisher for BusDomainEventPublisher<B> {
    async fn publish(&self, event: &OrderEvent) -> Result<(), PublishError> {
        match event {
            OrderEvent::OrderCreated(data) => {
                let body = OrderEventMessage {
                    order_request: Some(OrderRequestDto {
                        user_id: data.user_id.value(),
                        product_id: data.product_id.value(),
                        amount: data.amount.to_f64(),
                        order_id: Some(data.order_id),
                    }),
                    status: OrderEventStatus::OrderCreated,
                };

                let publish_error = |reason: String| PublishError {
                    event_type: event.event_type(),
                    reason,
                };
                let message =
                    Message::json(topics::ORDER_EVENTS, Some(data.order_id.to_string()), &body)
                        .map_err(|e| publish_error(e.to_string()))?;
                self.bus
                    .publish(message)
                    .await
                    .map_err(|e| publish_error(e.to_string()))
            }
            OrderEvent::OrderStatusChanged(data) => {
                tracing::debug!(
                    order_id = %data.order_id,
                    from = %data.previous_status,
                    to = %data.new_status,
                    "Order status changed"
                );
                Ok(())
            }
        }
    }
}
