//! Order use cases: create, get, list, cancel.

use common::OrderId;
use order_store::{OrderQuery, OrderRecord, OrderStore, Version};

use crate::aggregate::Aggregate;
use crate::command::{Command, CommandHandler, CommandResult};
use crate::error::DomainError;
use crate::publisher::DomainEventPublisher;

use super::{CancelOrder, CreateOrder, Order, OrderError};

/// Service for managing orders.
///
/// Every state change goes through [`OrderService::execute_then`]: load,
/// mutate, persist with optimistic concurrency, publish the drained events,
/// then run the caller's follow-up. If publishing or the follow-up fails the
/// saved change is written back to what was loaded.
pub struct OrderService<S: OrderStore, P: DomainEventPublisher> {
    handler: CommandHandler<S>,
    publisher: P,
}

impl<S: OrderStore, P: DomainEventPublisher> OrderService<S, P> {
    pub fn new(store: S, publisher: P) -> Self {
        Self {
            handler: CommandHandler::new(store),
            publisher,
        }
    }

    pub fn handler(&self) -> &CommandHandler<S> {
        &self.handler
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    /// Places a new order and publishes `OrderCreated`.
    #[tracing::instrument(skip(self, cmd), fields(order_id = %cmd.aggregate_id()))]
    pub async fn create_order(
        &self,
        cmd: CreateOrder,
    ) -> Result<CommandResult<Order>, DomainError> {
        let order = Order::create_with_id(cmd.order_id, cmd.user_id, cmd.product_id, cmd.price);
        let result = self.handler.insert(order).await?;
        if let Err(e) = self.publisher.publish_all(&result.events).await {
            let order_id = result.aggregate.id();
            match self.handler.discard(order_id, result.new_version).await {
                Ok(()) => tracing::warn!(%order_id, error = %e, "Order not published, insert taken back"),
                Err(undo) => tracing::error!(
                    %order_id,
                    error = %e,
                    undo_error = %undo,
                    "Order not published and could not be taken back"
                ),
            }
            return Err(e.into());
        }

        metrics::counter!("orders_created_total").increment(1);
        tracing::info!(
            user_id = %cmd.user_id,
            product_id = %cmd.product_id,
            price = %cmd.price,
            "Order created"
        );
        Ok(result)
    }

    /// User-initiated cancellation. Fails from `COMPLETED` or `CANCELLED`.
    #[tracing::instrument(skip(self, cmd), fields(order_id = %cmd.aggregate_id()))]
    pub async fn cancel_order(
        &self,
        cmd: CancelOrder,
    ) -> Result<CommandResult<Order>, DomainError> {
        let result = self.execute(cmd.order_id, |order| order.cancel()).await?;
        metrics::counter!("orders_cancelled_total", "reason" => "user").increment(1);
        tracing::info!("Order cancelled by user");
        Ok(result)
    }

    /// Loads an order by ID.
    ///
    /// Returns None if the order doesn't exist.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>, DomainError> {
        self.handler.load_existing(order_id).await
    }

    pub async fn list_orders(&self, query: OrderQuery) -> Result<Vec<Order>, DomainError> {
        let records = self.handler.store().list(query).await?;
        records
            .into_iter()
            .map(|record| Order::try_from(record).map_err(DomainError::from))
            .collect()
    }

    /// Runs `command_fn` against the stored order and publishes the
    /// resulting events.
    pub async fn execute<F>(
        &self,
        order_id: OrderId,
        command_fn: F,
    ) -> Result<CommandResult<Order>, DomainError>
    where
        F: FnOnce(&mut Order) -> Result<(), OrderError> + Send,
    {
        self.execute_then(order_id, command_fn, |_| async { Ok::<(), DomainError>(()) })
            .await
    }

    /// Runs `command_fn` against the stored order, publishes the drained
    /// events, then runs `then` on the updated order.
    ///
    /// The steps commit together. Nothing is persisted when `command_fn`
    /// fails; when publishing or `then` fails, the order is written back as
    /// it was loaded and the error is returned, so the same step can run
    /// again.
    pub async fn execute_then<F, T, Fut, Er>(
        &self,
        order_id: OrderId,
        command_fn: F,
        then: T,
    ) -> Result<CommandResult<Order>, Er>
    where
        F: FnOnce(&mut Order) -> Result<(), OrderError> + Send,
        T: FnOnce(&Order) -> Fut + Send,
        Fut: Future<Output = Result<(), Er>> + Send,
        Er: From<DomainError> + std::fmt::Display,
    {
        let order = self.handler.load(order_id).await?;
        let loaded = order.to_record();
        let result = self.handler.apply(order, command_fn).await?;

        if result.events.is_empty() {
            then(&result.aggregate).await?;
            return Ok(result);
        }

        let outcome = match self.publisher.publish_all(&result.events).await {
            Ok(()) => then(&result.aggregate).await,
            Err(e) => Err(Er::from(DomainError::from(e))),
        };
        if let Err(err) = outcome {
            self.roll_back(loaded, result.new_version, err.to_string())
                .await;
            return Err(err);
        }

        Ok(result)
    }

    async fn roll_back(&self, loaded: OrderRecord, written: Version, cause: String) {
        let order_id = loaded.id;
        let status = loaded.status.clone();
        match self.handler.restore(loaded, written).await {
            Ok(version) => {
                metrics::counter!("order_rollbacks_total").increment(1);
                tracing::warn!(%order_id, %status, %version, error = %cause, "Order change rolled back");
            }
            Err(e) => tracing::error!(
                %order_id,
                error = %cause,
                restore_error = %e,
                "Order change could not be rolled back"
            ),
        }
    }
}
