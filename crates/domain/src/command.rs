//! Command handling infrastructure.

use common::OrderId;
use order_store::{OrderRecord, OrderStore, SaveOptions, Version};

use crate::aggregate::Aggregate;
use crate::error::DomainError;
use crate::order::{Order, OrderError};

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult<A: Aggregate> {
    /// The aggregate after the command, with its event buffer drained.
    pub aggregate: A,

    /// The events the command recorded, in order.
    pub events: Vec<A::Event>,

    /// Persistence version after the command.
    pub new_version: Version,
}

/// A request to change one aggregate.
pub trait Command: Send + Sync {
    type Aggregate: Aggregate;

    fn aggregate_id(&self) -> <Self::Aggregate as Aggregate>::Id;
}

/// Runs one load → mutate → persist unit of work against an order.
///
/// The handler owns the loaded order exclusively for the duration of a
/// command. A command that fails leaves nothing persisted, and a save that
/// races another writer fails with a concurrency conflict instead of
/// overwriting it.
pub struct CommandHandler<S: OrderStore> {
    store: S,
}

impl<S: OrderStore> CommandHandler<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Loads an order, returning None if it doesn't exist.
    pub async fn load_existing(&self, order_id: OrderId) -> Result<Option<Order>, DomainError> {
        match self.store.find_by_id(order_id).await? {
            Some(record) => Ok(Some(Order::try_from(record)?)),
            None => Ok(None),
        }
    }

    /// Loads an order, failing with `OrderNotFound` if it doesn't exist.
    pub async fn load(&self, order_id: OrderId) -> Result<Order, DomainError> {
        self.load_existing(order_id)
            .await?
            .ok_or(DomainError::OrderNotFound(order_id))
    }

    /// Persists a newly created order. Fails if the id is already taken.
    pub async fn insert(&self, mut order: Order) -> Result<CommandResult<Order>, DomainError> {
        let new_version = self
            .store
            .save(order.to_record(), SaveOptions::expect_new())
            .await?;
        order.set_version(new_version);
        let events = order.take_events();

        Ok(CommandResult {
            aggregate: order,
            events,
            new_version,
        })
    }

    /// Loads an order, applies `command_fn` to it, and saves the result at
    /// the version it was loaded at.
    pub async fn execute<F>(
        &self,
        order_id: OrderId,
        command_fn: F,
    ) -> Result<CommandResult<Order>, DomainError>
    where
        F: FnOnce(&mut Order) -> Result<(), OrderError> + Send,
    {
        let order = self.load(order_id).await?;
        self.apply(order, command_fn).await
    }

    /// Applies `command_fn` to an already loaded order and saves it at the
    /// version it was loaded at.
    ///
    /// If `command_fn` fails, the loaded copy is discarded and the stored
    /// order stays as it was. A command that records no events is not saved.
    pub async fn apply<F>(
        &self,
        mut order: Order,
        command_fn: F,
    ) -> Result<CommandResult<Order>, DomainError>
    where
        F: FnOnce(&mut Order) -> Result<(), OrderError> + Send,
    {
        let loaded_version = order.version();

        command_fn(&mut order)?;

        if !order.has_pending_events() {
            return Ok(CommandResult {
                aggregate: order,
                events: vec![],
                new_version: loaded_version,
            });
        }

        let new_version = self
            .store
            .save(
                order.to_record(),
                SaveOptions::expect_version(loaded_version),
            )
            .await?;
        order.set_version(new_version);
        let events = order.take_events();

        Ok(CommandResult {
            aggregate: order,
            events,
            new_version,
        })
    }

    /// Writes `previous` back over the row saved at `written`. Fails with a
    /// concurrency conflict if another writer got there first.
    pub async fn restore(
        &self,
        previous: OrderRecord,
        written: Version,
    ) -> Result<Version, DomainError> {
        Ok(self
            .store
            .save(previous, SaveOptions::expect_version(written))
            .await?)
    }

    /// Removes an order inserted at `written`.
    pub async fn discard(&self, order_id: OrderId, written: Version) -> Result<(), DomainError> {
        Ok(self.store.delete(order_id, written).await?)
    }
}

#[cfg(test)]
mod tests {
    use order_store::InMemoryOrderStore;

    use super::*;
    use crate::order::{Money, OrderStatus, ProductId, UserId};

    fn new_order() -> Order {
        Order::create(
            UserId::new(1).unwrap(),
            ProductId::new(1).unwrap(),
            Money::from_cents(500).unwrap(),
        )
    }

    #[tokio::test]
    async fn insert_persists_and_drains_created_event() {
        let handler = CommandHandler::new(InMemoryOrderStore::new());

        let result = handler.insert(new_order()).await.unwrap();

        assert_eq!(result.new_version, Version::first());
        assert_eq!(result.events.len(), 1);
        assert!(!result.aggregate.has_pending_events());
        assert!(
            handler
                .store()
                .find_by_id(result.aggregate.id())
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn execute_applies_and_bumps_version() {
        let handler = CommandHandler::new(InMemoryOrderStore::new());
        let order_id = handler.insert(new_order()).await.unwrap().aggregate.id();

        let result = handler
            .execute(order_id, |order| order.mark_payment_pending())
            .await
            .unwrap();

        assert_eq!(result.new_version, Version::new(2));
        assert_eq!(result.aggregate.status(), OrderStatus::PaymentPending);
        let stored = handler.load(order_id).await.unwrap();
        assert_eq!(stored.status(), OrderStatus::PaymentPending);
        assert_eq!(stored.version(), Version::new(2));
    }

    #[tokio::test]
    async fn failing_command_persists_nothing() {
        let handler = CommandHandler::new(InMemoryOrderStore::new());
        let order_id = handler.insert(new_order()).await.unwrap().aggregate.id();

        let err = handler
            .execute(order_id, |order| {
                order.mark_payment_pending()?;
                order.complete()
            })
            .await
            .unwrap_err();

        assert!(err.is_invalid_transition());
        let stored = handler.load(order_id).await.unwrap();
        assert_eq!(stored.status(), OrderStatus::Created);
        assert_eq!(stored.version(), Version::first());
    }

    #[tokio::test]
    async fn execute_on_missing_order_is_not_found() {
        let handler = CommandHandler::new(InMemoryOrderStore::new());

        let err = handler
            .execute(OrderId::new(), |order| order.cancel())
            .await
            .unwrap_err();

        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn stale_writer_gets_concurrency_conflict() {
        let store = InMemoryOrderStore::new();
        let handler = CommandHandler::new(store.clone());
        let order_id = handler.insert(new_order()).await.unwrap().aggregate.id();

        // Another writer moves the row forward after our load.
        let mut stale = handler.load(order_id).await.unwrap();
        handler
            .execute(order_id, |order| order.cancel())
            .await
            .unwrap();

        stale.mark_payment_pending().unwrap();
        let err = store
            .save(
                stale.to_record(),
                SaveOptions::expect_version(stale.version()),
            )
            .await
            .unwrap_err();
        assert!(err.is_concurrency_conflict());

        let stored = handler.load(order_id).await.unwrap();
        assert_eq!(stored.status(), OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn restore_puts_loaded_row_back() {
        let handler = CommandHandler::new(InMemoryOrderStore::new());
        let order_id = handler.insert(new_order()).await.unwrap().aggregate.id();
        let loaded = handler.load(order_id).await.unwrap().to_record();
        let result = handler
            .execute(order_id, |order| order.mark_payment_pending())
            .await
            .unwrap();

        let version = handler
            .restore(loaded.clone(), result.new_version)
            .await
            .unwrap();

        assert_eq!(version, Version::new(3));
        let stored = handler.load(order_id).await.unwrap();
        assert_eq!(stored.status(), OrderStatus::Created);
        let err = handler
            .restore(loaded, result.new_version)
            .await
            .unwrap_err();
        assert!(err.is_concurrency_conflict());
    }

    #[tokio::test]
    async fn discard_removes_inserted_order() {
        let handler = CommandHandler::new(InMemoryOrderStore::new());
        let result = handler.insert(new_order()).await.unwrap();

        handler
            .discard(result.aggregate.id(), result.new_version)
            .await
            .unwrap();

        assert!(handler.load_existing(result.aggregate.id()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn no_op_command_skips_save() {
        let handler = CommandHandler::new(InMemoryOrderStore::new());
        let order_id = handler.insert(new_order()).await.unwrap().aggregate.id();

        let result = handler.execute(order_id, |_| Ok(())).await.unwrap();

        assert!(result.events.is_empty());
        assert_eq!(result.new_version, Version::first());
    }
}
