//! Messaging transport for the order purchase saga.
//!
//! This crate provides:
//! - The `MessageBus` port and a broadcast-backed in-memory bus
//! - Adapters that put saga commands and order events on the wire
//! - `SagaListener`, which feeds inbound topics to the saga consumer
//! - Simulated payment and inventory services speaking the same contract

pub mod adapters;
pub mod bus;
pub mod collaborators;
pub mod error;
pub mod listener;

pub use adapters::{BusDomainEventPublisher, BusInventoryCommandSender, BusPaymentCommandSender};
pub use bus::{InMemoryMessageBus, Message, MessageBus, Subscription};
pub use collaborators::{InventorySimulator, PaymentSimulator};
pub use error::{MessagingError, Result};
pub use listener::{ListenerHandle, SagaListener};
