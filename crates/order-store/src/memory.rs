use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    OrderId, OrderQuery, OrderRecord, OrderStoreError, Result, Version,
    store::{OrderStore, SaveOptions},
};

/// In-memory order store for tests and single-process deployments.
///
/// Same contract as the PostgreSQL store: the version check and write happen
/// under one write lock.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<HashMap<OrderId, OrderRecord>>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn clear(&self) {
        self.orders.write().await.clear();
    }

    fn sorted(mut records: Vec<OrderRecord>) -> Vec<OrderRecord> {
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        records
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn find_by_id(&self, order_id: OrderId) -> Result<Option<OrderRecord>> {
        Ok(self.orders.read().await.get(&order_id).cloned())
    }

    async fn save(&self, mut record: OrderRecord, options: SaveOptions) -> Result<Version> {
        let mut orders = self.orders.write().await;

        let current = orders
            .get(&record.id)
            .map(|r| r.version)
            .unwrap_or_else(Version::initial);

        if current != options.expected_version {
            return Err(OrderStoreError::ConcurrencyConflict {
                order_id: record.id,
                expected: options.expected_version,
                actual: current,
            });
        }

        let new_version = current.next();
        record.version = new_version;
        orders.insert(record.id, record);

        metrics::counter!("order_store_saves_total", "store" => "memory").increment(1);
        Ok(new_version)
    }

    async fn delete(&self, order_id: OrderId, expected: Version) -> Result<()> {
        let mut orders = self.orders.write().await;

        let actual = orders
            .get(&order_id)
            .map(|r| r.version)
            .unwrap_or_else(Version::initial);
        if actual != expected {
            return Err(OrderStoreError::ConcurrencyConflict {
                order_id,
                expected,
                actual,
            });
        }

        orders.remove(&order_id);
        Ok(())
    }

    async fn list(&self, query: OrderQuery) -> Result<Vec<OrderRecord>> {
        let orders = self.orders.read().await;
        let matching: Vec<_> = orders
            .values()
            .filter(|r| query.matches(r))
            .cloned()
            .collect();

        let records = Self::sorted(matching)
            .into_iter()
            .skip(query.offset.unwrap_or(0));

        Ok(match query.limit {
            Some(limit) => records.take(limit).collect(),
            None => records.collect(),
        })
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.orders.read().await.len() as u64)
    }
}
