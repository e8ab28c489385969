//! Inventory command port and in-memory implementation.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::commands::{ReleaseInventory, ReserveInventory, SagaCommand};
use crate::error::SagaError;

/// Sends commands to the inventory service.
#[async_trait]
pub trait InventoryCommandSender: Send + Sync {
    /// Asks for one unit of the product to be reserved. The outcome arrives
    /// later as an inventory event.
    async fn reserve_inventory(&self, cmd: ReserveInventory) -> Result<(), SagaError>;

    /// Returns a reserved unit to stock. No reply is expected.
    async fn release_inventory(&self, cmd: ReleaseInventory) -> Result<(), SagaError>;
}

#[derive(Debug, Default)]
struct InMemoryInventoryState {
    sent: Vec<SagaCommand>,
    fail_on_send: bool,
}

/// Inventory sender that records commands instead of sending them.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInventoryCommandSender {
    state: Arc<RwLock<InMemoryInventoryState>>,
}

impl InMemoryInventoryCommandSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_fail_on_send(&self, fail: bool) {
        self.state.write().await.fail_on_send = fail;
    }

    pub async fn sent(&self) -> Vec<SagaCommand> {
        self.state.read().await.sent.clone()
    }

    pub async fn reservations(&self) -> Vec<ReserveInventory> {
        self.sent()
            .await
            .into_iter()
            .filter_map(|c| match c {
                SagaCommand::ReserveInventory(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    async fn record(&self, command: SagaCommand) -> Result<(), SagaError> {
        let mut state = self.state.write().await;
        if state.fail_on_send {
            return Err(SagaError::CommandDispatch {
                command: command.command_type(),
                order_id: command.order_id(),
                reason: "inventory channel unavailable".to_string(),
            });
        }
        state.sent.push(command);
        Ok(())
    }
}

#[async_trait]
impl InventoryCommandSender for InMemoryInventoryCommandSender {
    async fn reserve_inventory(&self, cmd: ReserveInventory) -> Result<(), SagaError> {
        self.record(SagaCommand::ReserveInventory(cmd)).await
    }

    async fn release_inventory(&self, cmd: ReleaseInventory) -> Result<(), SagaError> {
        self.record(SagaCommand::ReleaseInventory(cmd)).await
    }
}
