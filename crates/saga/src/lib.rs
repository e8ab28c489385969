//! Orchestration of the order purchase saga.
//!
//! The saga has three fixed steps, each confirmed by a reply message:
//! 1. Charge the user (payment service)
//! 2. Reserve one unit of the product (inventory service)
//! 3. Complete the order
//!
//! A payment failure cancels the order. An inventory rejection refunds the
//! payment and then cancels the order. The orchestrator is the only writer of
//! order state for these steps; the consumer maps inbound messages onto it.

pub mod commands;
pub mod consumer;
pub mod error;
pub mod orchestrator;
pub mod services;

pub use commands::{
    ProcessPayment, RefundPayment, ReleaseInventory, ReserveInventory, SagaCommand,
};
pub use consumer::{DiscardReason, Dispatch, SagaEventConsumer};
pub use error::{Result, SagaError};
pub use orchestrator::{SagaEventHandler, SagaOrchestrator, SagaStep};
pub use services::{
    InMemoryInventoryCommandSender, InMemoryPaymentCommandSender, InventoryCommandSender,
    PaymentCommandSender,
};
