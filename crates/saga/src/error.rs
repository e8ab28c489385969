//! Saga error types.

use common::OrderId;
use domain::{DomainError, OrderError};
use thiserror::Error;

/// Errors that can occur while handling a saga step.
#[derive(Debug, Error)]
pub enum SagaError {
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// Loading, transitioning, persisting, or publishing failed.
    #[error("Domain error: {0}")]
    Domain(DomainError),

    /// The outbound command could not be sent. The step was rolled back.
    #[error("Failed to send {command} for order {order_id}: {reason}")]
    CommandDispatch {
        command: &'static str,
        order_id: OrderId,
        reason: String,
    },
}

impl SagaError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, SagaError::OrderNotFound(_))
    }

    /// True when the order's status did not allow the step, e.g. a replayed
    /// reply for a step that already happened.
    pub fn is_invalid_transition(&self) -> bool {
        matches!(self, SagaError::Domain(e) if e.is_invalid_transition())
    }

    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, SagaError::Domain(e) if e.is_concurrency_conflict())
    }
}

impl From<DomainError> for SagaError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::OrderNotFound(order_id) => SagaError::OrderNotFound(order_id),
            other => SagaError::Domain(other),
        }
    }
}

impl From<OrderError> for SagaError {
    fn from(e: OrderError) -> Self {
        SagaError::Domain(DomainError::Order(e))
    }
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
