use thiserror::Error;

use crate::{OrderId, Version};

/// Errors that can occur when reading or writing orders.
#[derive(Debug, Error)]
pub enum OrderStoreError {
    /// The stored version did not match the version the writer loaded.
    #[error(
        "Concurrency conflict for order {order_id}: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        order_id: OrderId,
        expected: Version,
        actual: Version,
    },

    /// A stored row could not be mapped back into an order.
    #[error("Invalid order record {order_id}: {reason}")]
    InvalidRecord { order_id: OrderId, reason: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl OrderStoreError {
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }
}

/// Result type for order store operations.
pub type Result<T> = std::result::Result<T, OrderStoreError>;
