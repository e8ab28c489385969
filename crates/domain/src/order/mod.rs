//! Order aggregate and related types.

mod aggregate;
mod commands;
mod events;
mod record;
mod service;
mod status;
mod value_objects;

pub use aggregate::Order;
pub use commands::{CancelOrder, CreateOrder};
pub use events::{OrderCreatedData, OrderEvent, OrderStatusChangedData};
pub use service::OrderService;
pub use status::{OrderStatus, UnknownStatus};
pub use value_objects::{Money, ProductId, UserId};

use thiserror::Error;

/// Errors raised by the order aggregate and its value objects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// The behavior method is not allowed from the current status.
    #[error("Invalid state transition: cannot {action} from {current_status} status")]
    InvalidStateTransition {
        current_status: OrderStatus,
        action: &'static str,
    },

    /// Input rejected before any state was touched.
    #[error("Invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },
}

impl OrderError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        OrderError::Validation {
            field,
            reason: reason.into(),
        }
    }
}
