pub mod error;
pub mod memory;
pub mod postgres;
pub mod query;
pub mod record;
pub mod store;

pub use common::OrderId;
pub use error::{OrderStoreError, Result};
pub use memory::InMemoryOrderStore;
pub use postgres::PostgresOrderStore;
pub use query::OrderQuery;
pub use record::{OrderRecord, Version};
pub use store::{OrderStore, SaveOptions};
