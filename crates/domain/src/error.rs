//! Domain error types.

use common::OrderId;
use order_store::OrderStoreError;
use thiserror::Error;

use crate::order::OrderError;
use crate::publisher::PublishError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Order store error: {0}")]
    Store(#[from] OrderStoreError),

    /// The aggregate rejected the operation.
    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// Events could not be published. The state change was rolled back.
    #[error("Event publish error: {0}")]
    Publish(#[from] PublishError),
}

impl DomainError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, DomainError::OrderNotFound(_))
    }

    pub fn is_invalid_transition(&self) -> bool {
        matches!(
            self,
            DomainError::Order(OrderError::InvalidStateTransition { .. })
        )
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, DomainError::Order(OrderError::Validation { .. }))
    }

    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, DomainError::Store(e) if e.is_concurrency_conflict())
    }
}
