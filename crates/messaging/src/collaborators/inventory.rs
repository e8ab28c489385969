//! Simulated inventory service.

use std::collections::HashMap;
use std::sync::Arc;

use common::contract::{InventoryEventMessage, InventoryEventStatus, InventoryRequestDto, topics};
use tokio::sync::{RwLock, watch};

use crate::bus::{Message, MessageBus};
use crate::error::Result;
use crate::listener::ListenerHandle;

/// Keeps available stock per product. Every reservation takes one unit.
///
/// Products start with the configured stock the first time they are touched.
#[derive(Debug, Clone)]
pub struct InventorySimulator<B: MessageBus> {
    bus: B,
    initial_stock: u32,
    stock: Arc<RwLock<HashMap<i64, u32>>>,
}

impl<B: MessageBus + Clone + 'static> InventorySimulator<B> {
    pub fn new(bus: B, initial_stock: u32) -> Self {
        Self {
            bus,
            initial_stock,
            stock: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn stock(&self, product_id: i64) -> u32 {
        self.stock
            .read()
            .await
            .get(&product_id)
            .copied()
            .unwrap_or(self.initial_stock)
    }

    pub async fn set_stock(&self, product_id: i64, units: u32) {
        self.stock.write().await.insert(product_id, units);
    }

    /// Applies one inventory command and returns the reply to publish, if
    /// any. Releases are never answered.
    pub async fn handle(&self, request: &InventoryRequestDto) -> Option<InventoryEventMessage> {
        let Some(order_id) = request.order_id else {
            tracing::warn!("Inventory command without order id ignored");
            return None;
        };

        let mut stock = self.stock.write().await;
        let available = stock.entry(request.product_id).or_insert(self.initial_stock);

        if request.is_release() {
            *available = available.saturating_add(1);
            tracing::info!(%order_id, product_id = request.product_id, stock = *available, "Inventory released");
            return None;
        }

        let status = if *available > 0 {
            *available -= 1;
            tracing::info!(%order_id, product_id = request.product_id, stock = *available, "Inventory reserved");
            InventoryEventStatus::InventoryReserved
        } else {
            tracing::warn!(%order_id, product_id = request.product_id, "Inventory rejected, out of stock");
            InventoryEventStatus::InventoryRejected
        };

        Some(InventoryEventMessage {
            inventory_request: Some(request.clone()),
            status,
        })
    }

    /// Decodes a command from the bus, applies it, and publishes the reply.
    pub async fn process(&self, message: &Message) -> Result<()> {
        let request: InventoryRequestDto = message.decode()?;
        if let Some(reply) = self.handle(&request).await {
            let key = request.order_id.map(|id| id.to_string());
            self.bus
                .publish(Message::json(topics::INVENTORY_EVENTS, key, &reply)?)
                .await?;
        }
        Ok(())
    }

    /// Consumes `inventory-commands-out` on a background task.
    pub async fn spawn(self) -> Result<ListenerHandle> {
        let mut commands = self.bus.subscribe(topics::INVENTORY_COMMANDS).await?;
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            loop {
                let message = tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => break,
                    Some(m) = commands.recv() => m,
                    else => break,
                };
                if let Err(e) = self.process(&message).await {
                    tracing::error!(error = %e, "Inventory simulator failed to handle command");
                }
            }
        });

        Ok(ListenerHandle::new("inventory-simulator", shutdown_tx, task))
    }
}
