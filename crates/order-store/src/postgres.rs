use async_trait::async_trait;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    OrderId, OrderQuery, OrderRecord, OrderStoreError, Result, Version,
    store::{OrderStore, SaveOptions},
};

const SELECT_COLUMNS: &str =
    "SELECT id, user_id, product_id, price_cents, status, created_at, updated_at, version FROM orders";

/// PostgreSQL-backed order store.
///
/// Optimistic concurrency is enforced in the write statement itself
/// (`ON CONFLICT DO NOTHING` for inserts, `WHERE version = $n` for updates),
/// so no explicit transaction or row lock is taken.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to `database_url` and returns a store over a fresh pool.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_record(row: PgRow) -> Result<OrderRecord> {
        Ok(OrderRecord {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            user_id: row.try_get("user_id")?,
            product_id: row.try_get("product_id")?,
            price_cents: row.try_get("price_cents")?,
            status: row.try_get("status")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            version: Version::new(row.try_get("version")?),
        })
    }

    async fn stored_version(&self, order_id: OrderId) -> Result<Version> {
        let version: Option<i64> = sqlx::query_scalar("SELECT version FROM orders WHERE id = $1")
            .bind(order_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        Ok(version.map(Version::new).unwrap_or_else(Version::initial))
    }

    async fn conflict(&self, order_id: OrderId, expected: Version) -> OrderStoreError {
        match self.stored_version(order_id).await {
            Ok(actual) => OrderStoreError::ConcurrencyConflict {
                order_id,
                expected,
                actual,
            },
            Err(e) => e,
        }
    }

    async fn insert_new(&self, record: &OrderRecord) -> Result<Option<Version>> {
        let version: Option<i64> = sqlx::query_scalar(
            r#"
            INSERT INTO orders (id, user_id, product_id, price_cents, status, created_at, updated_at, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, 1)
            ON CONFLICT (id) DO NOTHING
            RETURNING version
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(record.user_id)
        .bind(record.product_id)
        .bind(record.price_cents)
        .bind(&record.status)
        .bind(record.created_at)
        .bind(record.updated_at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(version.map(Version::new))
    }

    async fn update_at(&self, record: &OrderRecord, expected: Version) -> Result<Option<Version>> {
        let version: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE orders
            SET status = $2, updated_at = $3, version = version + 1
            WHERE id = $1 AND version = $4
            RETURNING version
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(&record.status)
        .bind(record.updated_at)
        .bind(expected.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        Ok(version.map(Version::new))
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    async fn find_by_id(&self, order_id: OrderId) -> Result<Option<OrderRecord>> {
        let row: Option<PgRow> = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = $1"))
            .bind(order_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Self::row_to_record).transpose()
    }

    #[tracing::instrument(skip(self, record), fields(order_id = %record.id, status = %record.status))]
    async fn save(&self, record: OrderRecord, options: SaveOptions) -> Result<Version> {
        let expected = options.expected_version;
        let saved = if expected == Version::initial() {
            self.insert_new(&record).await?
        } else {
            self.update_at(&record, expected).await?
        };

        match saved {
            Some(version) => {
                metrics::counter!("order_store_saves_total", "store" => "postgres").increment(1);
                Ok(version)
            }
            None => {
                let err = self.conflict(record.id, expected).await;
                tracing::warn!(error = %err, "Rejected stale order write");
                Err(err)
            }
        }
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, order_id: OrderId, expected: Version) -> Result<()> {
        let deleted = sqlx::query("DELETE FROM orders WHERE id = $1 AND version = $2")
            .bind(order_id.as_uuid())
            .bind(expected.as_i64())
            .execute(&self.pool)
            .await?
            .rows_affected();

        if deleted == 0 {
            return Err(self.conflict(order_id, expected).await);
        }
        Ok(())
    }

    async fn list(&self, query: OrderQuery) -> Result<Vec<OrderRecord>> {
        let mut sql = format!("{SELECT_COLUMNS} WHERE 1=1");
        let mut param_count = 0;

        if query.status.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND status = ${param_count}"));
        }
        if query.user_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND user_id = ${param_count}"));
        }

        sql.push_str(" ORDER BY created_at ASC, id ASC");

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }
        if query.offset.is_some() {
            param_count += 1;
            sql.push_str(&format!(" OFFSET ${param_count}"));
        }

        let mut sqlx_query = sqlx::query(&sql);
        if let Some(status) = query.status {
            sqlx_query = sqlx_query.bind(status);
        }
        if let Some(user_id) = query.user_id {
            sqlx_query = sqlx_query.bind(user_id);
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }
        if let Some(offset) = query.offset {
            sqlx_query = sqlx_query.bind(i64::try_from(offset).unwrap_or(i64::MAX));
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_record).collect()
    }

    async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}
