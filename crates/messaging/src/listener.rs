//! Inbound subscription loop for the saga.

use std::sync::Arc;

use common::contract::{InventoryEventMessage, OrderEventMessage, PaymentEventMessage, topics};
use saga::{Dispatch, SagaEventConsumer, SagaEventHandler};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::bus::{Message, MessageBus};
use crate::error::{MessagingError, Result};

/// Topics the saga listens on.
pub const INBOUND_TOPICS: [&str; 3] = [
    topics::ORDER_EVENTS,
    topics::PAYMENT_EVENTS,
    topics::INVENTORY_EVENTS,
];

/// Handle to a background task started on the bus.
pub struct ListenerHandle {
    name: &'static str,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ListenerHandle {
    pub(crate) fn new(
        name: &'static str,
        shutdown: watch::Sender<bool>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            name,
            shutdown,
            task,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops the task after the message it is handling, then waits for it.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::error!(task = self.name, error = %e, "Background task ended abnormally");
        } else {
            tracing::info!(task = self.name, "Background task stopped");
        }
    }
}

/// Feeds order, payment, and inventory events to the saga consumer.
///
/// Messages are handled one at a time in arrival order. Undecodable payloads
/// and failed steps are logged and dropped; nothing is retried.
pub struct SagaListener<H: SagaEventHandler + 'static> {
    consumer: Arc<SagaEventConsumer<H>>,
}

impl<H: SagaEventHandler + 'static> Clone for SagaListener<H> {
    fn clone(&self) -> Self {
        Self {
            consumer: Arc::clone(&self.consumer),
        }
    }
}

impl<H: SagaEventHandler + 'static> SagaListener<H> {
    pub fn new(consumer: SagaEventConsumer<H>) -> Self {
        Self {
            consumer: Arc::new(consumer),
        }
    }

    pub fn consumer(&self) -> &SagaEventConsumer<H> {
        &self.consumer
    }

    /// Decodes one message and routes it by topic.
    #[tracing::instrument(skip(self, message), fields(topic = %message.topic, message_id = %message.id))]
    pub async fn handle(&self, message: &Message) -> Result<Dispatch> {
        let dispatch = match message.topic.as_str() {
            topics::ORDER_EVENTS => {
                let event: OrderEventMessage = message.decode()?;
                self.consumer.handle_order_event(&event).await?
            }
            topics::PAYMENT_EVENTS => {
                let event: PaymentEventMessage = message.decode()?;
                self.consumer.handle_payment_event(&event).await?
            }
            topics::INVENTORY_EVENTS => {
                let event: InventoryEventMessage = message.decode()?;
                self.consumer.handle_inventory_event(&event).await?
            }
            other => return Err(MessagingError::UnknownTopic(other.to_string())),
        };
        Ok(dispatch)
    }

    /// Subscribes to the inbound topics and processes messages on a
    /// background task until the returned handle is shut down.
    pub async fn spawn<B: MessageBus>(self, bus: &B) -> Result<ListenerHandle> {
        let mut orders = bus.subscribe(topics::ORDER_EVENTS).await?;
        let mut payments = bus.subscribe(topics::PAYMENT_EVENTS).await?;
        let mut inventory = bus.subscribe(topics::INVENTORY_EVENTS).await?;
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            tracing::info!(topics = ?INBOUND_TOPICS, "Saga listener started");
            loop {
                let message = tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => break,
                    Some(m) = orders.recv() => m,
                    Some(m) = payments.recv() => m,
                    Some(m) = inventory.recv() => m,
                    else => break,
                };
                self.process(&message).await;
            }
        });

        Ok(ListenerHandle::new("saga-listener", shutdown_tx, task))
    }

    async fn process(&self, message: &Message) {
        match self.handle(message).await {
            Ok(Dispatch::Handled(step)) => {
                tracing::debug!(topic = %message.topic, %step, "Message handled");
            }
            Ok(Dispatch::Discarded(reason)) => {
                tracing::debug!(topic = %message.topic, ?reason, "Message discarded");
            }
            Err(MessagingError::Serialization(e)) => {
                metrics::counter!("saga_messages_undecodable_total", "topic" => message.topic.clone())
                    .increment(1);
                tracing::warn!(topic = %message.topic, error = %e, "Dropping undecodable message");
            }
            Err(MessagingError::Saga(e)) if e.is_invalid_transition() => {
                tracing::warn!(topic = %message.topic, error = %e, "Dropping out-of-order or duplicate message");
            }
            Err(e) => {
                tracing::error!(topic = %message.topic, error = %e, "Failed to handle message");
            }
        }
    }
}
