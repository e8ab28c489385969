//! Domain layer for the order purchase saga.
//!
//! This crate provides:
//! - Aggregate and DomainEvent traits
//! - The Order aggregate and its status state machine
//! - CommandHandler, the load/mutate/persist unit shared by every use case
//! - OrderService with the create, get, and cancel use cases
//! - The DomainEventPublisher port

pub mod aggregate;
pub mod command;
pub mod error;
pub mod order;
pub mod publisher;

pub use aggregate::{Aggregate, DomainEvent};
pub use command::{Command, CommandHandler, CommandResult};
pub use error::DomainError;
pub use order::{
    CancelOrder, CreateOrder, Money, Order, OrderCreatedData, OrderError, OrderEvent, OrderService,
    OrderStatus, OrderStatusChangedData, ProductId, UserId,
};
pub use publisher::{DomainEventPublisher, InMemoryDomainEventPublisher, PublishError};
