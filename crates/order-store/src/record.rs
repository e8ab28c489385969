use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::OrderId;

/// Persistence version of an order row, used for optimistic concurrency.
///
/// An order that was never saved is at version 0. The first save writes
/// version 1 and every later save increments it by one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Version(i64);

impl Version {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Version of an order that has not been persisted yet.
    pub fn initial() -> Self {
        Self(0)
    }

    /// Version written by the first save.
    pub fn first() -> Self {
        Self(1)
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Version {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<Version> for i64 {
    fn from(version: Version) -> Self {
        version.0
    }
}

/// Flat, storage-shaped representation of an order.
///
/// The store knows nothing about order semantics: `status` is an opaque
/// string and money is kept in integer cents. Mapping to and from the domain
/// aggregate lives in the domain crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: OrderId,
    pub user_id: i64,
    pub product_id: i64,
    pub price_cents: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Version this record was read at. Ignored on save, where the
    /// expectation travels in `SaveOptions`.
    pub version: Version,
}
