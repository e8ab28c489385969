//! Payment command port and in-memory implementation.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::commands::{ProcessPayment, RefundPayment, SagaCommand};
use crate::error::SagaError;

/// Sends commands to the payment service.
#[async_trait]
pub trait PaymentCommandSender: Send + Sync {
    /// Asks the payment service to charge the user. The outcome arrives later
    /// as a payment event.
    async fn process_payment(&self, cmd: ProcessPayment) -> Result<(), SagaError>;

    /// Asks the payment service to refund the order. No reply is expected.
    async fn refund_payment(&self, cmd: RefundPayment) -> Result<(), SagaError>;
}

#[derive(Debug, Default)]
struct InMemoryPaymentState {
    sent: Vec<SagaCommand>,
    fail_on_send: bool,
}

/// Payment sender that records commands instead of sending them.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentCommandSender {
    state: Arc<RwLock<InMemoryPaymentState>>,
}

impl InMemoryPaymentCommandSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following send fail.
    pub async fn set_fail_on_send(&self, fail: bool) {
        self.state.write().await.fail_on_send = fail;
    }

    /// All recorded commands, oldest first.
    pub async fn sent(&self) -> Vec<SagaCommand> {
        self.state.read().await.sent.clone()
    }

    pub async fn payments(&self) -> Vec<ProcessPayment> {
        self.sent()
            .await
            .into_iter()
            .filter_map(|c| match c {
                SagaCommand::ProcessPayment(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    pub async fn refunds(&self) -> Vec<RefundPayment> {
        self.sent()
            .await
            .into_iter()
            .filter_map(|c| match c {
                SagaCommand::RefundPayment(r) => Some(r),
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
                reason: "payment channel unavailable".to_string(),
            });
        }
        state.sent.push(command);
        Ok(())
    }
}

#[async_trait]
impl PaymentCommandSender for InMemoryPaymentCommandSender {
    async fn process_payment(&self, cmd: ProcessPayment) -> Result<(), SagaError> {
        self.record(SagaCommand::ProcessPayment(cmd)).await
    }

    async fn refund_payment(&self, cmd: RefundPayment) -> Result<(), SagaError> {
        self.record(SagaCommand::RefundPayment(cmd)).await
    }
}
