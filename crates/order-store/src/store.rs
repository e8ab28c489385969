use async_trait::async_trait;

use crate::{OrderId, OrderQuery, OrderRecord, Result, Version};

/// Version expectation for a write.
#[derive(Debug, Clone, Copy)]
pub struct SaveOptions {
    /// Version the writer loaded, `Version::initial()` for an insert.
    pub expected_version: Version,
}

impl SaveOptions {
    /// The stored row must still be at `version`.
    pub fn expect_version(version: Version) -> Self {
        Self {
            expected_version: version,
        }
    }

    /// The order must not exist yet.
    pub fn expect_new() -> Self {
        Self::expect_version(Version::initial())
    }
}

/// Persistence port for orders.
///
/// Implementations must be thread-safe and must apply the version check and
/// the write as one atomic step, so two writers that loaded the same version
/// cannot both succeed.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Loads an order by id.
    async fn find_by_id(&self, order_id: OrderId) -> Result<Option<OrderRecord>>;

    /// Inserts or updates an order.
    ///
    /// Fails with `ConcurrencyConflict` if the stored version (0 when absent)
    /// is not `options.expected_version`. Returns the version the record now
    /// has.
    async fn save(&self, record: OrderRecord, options: SaveOptions) -> Result<Version>;

    /// Removes an order that is still at `expected`.
    ///
    /// Only used to take back an insert whose unit of work did not finish.
    async fn delete(&self, order_id: OrderId, expected: Version) -> Result<()>;

    /// Lists orders matching a query, oldest first.
    async fn list(&self, query: OrderQuery) -> Result<Vec<OrderRecord>>;

    /// Number of stored orders.
    async fn count(&self) -> Result<u64>;
}
