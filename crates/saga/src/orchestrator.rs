//! Saga orchestrator for the order purchase saga.

use std::time::Instant;

use async_trait::async_trait;
use common::OrderId;
use domain::{CommandResult, DomainEventPublisher, Order, OrderError, OrderService, OrderStatus};
use order_store::OrderStore;

use crate::commands::{ProcessPayment, RefundPayment, ReserveInventory, SagaCommand};
use crate::error::SagaError;
use crate::services::{InventoryCommandSender, PaymentCommandSender};

/// The inbound signals that advance the saga.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SagaStep {
    OrderCreated,
    PaymentCompleted,
    PaymentFailed,
    InventoryReserved,
    InventoryRejected,
}

impl SagaStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaStep::OrderCreated => "order_created",
            SagaStep::PaymentCompleted => "payment_completed",
            SagaStep::PaymentFailed => "payment_failed",
            SagaStep::InventoryReserved => "inventory_reserved",
            SagaStep::InventoryRejected => "inventory_rejected",
        }
    }
}

impl std::fmt::Display for SagaStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reacts to inbound saga signals. Implemented by [`SagaOrchestrator`];
/// the consumer only depends on this trait.
#[async_trait]
pub trait SagaEventHandler: Send + Sync {
    async fn on_order_created(&self, order_id: OrderId) -> Result<(), SagaError>;
    async fn on_payment_completed(&self, order_id: OrderId) -> Result<(), SagaError>;
    async fn on_payment_failed(&self, order_id: OrderId) -> Result<(), SagaError>;
    async fn on_inventory_reserved(&self, order_id: OrderId) -> Result<(), SagaError>;
    async fn on_inventory_rejected(&self, order_id: OrderId) -> Result<(), SagaError>;
}

/// Drives orders through the purchase saga.
///
/// Each handler is one unit of work on one order: load it, apply the step's
/// transitions, persist at the loaded version, publish the drained events,
/// and send at most one outbound command. If publishing or sending fails the
/// order is put back as it was loaded, so a redelivered reply runs the step
/// again. A rejected transition or a stale write stops the step before
/// anything is persisted or sent.
pub struct SagaOrchestrator<S, E, P, I>
where
    S: OrderStore,
    E: DomainEventPublisher,
    P: PaymentCommandSender,
    I: InventoryCommandSender,
{
    orders: OrderService<S, E>,
    payment: P,
    inventory: I,
}

impl<S, E, P, I> SagaOrchestrator<S, E, P, I>
where
    S: OrderStore,
    E: DomainEventPublisher,
    P: PaymentCommandSender,
    I: InventoryCommandSender,
{
    pub fn new(store: S, publisher: E, payment: P, inventory: I) -> Self {
        Self {
            orders: OrderService::new(store, publisher),
            payment,
            inventory,
        }
    }

    pub fn order_service(&self) -> &OrderService<S, E> {
        &self.orders
    }

    /// Starts the saga: marks payment pending and asks for the charge.
    #[tracing::instrument(skip(self), fields(saga_step = "order_created"))]
    pub async fn on_order_created(
        &self,
        order_id: OrderId,
    ) -> Result<CommandResult<Order>, SagaError> {
        self.run_step(
            SagaStep::OrderCreated,
            order_id,
            |o| o.mark_payment_pending(),
            |o| self.dispatch(SagaCommand::ProcessPayment(ProcessPayment::for_order(o))),
        )
        .await
    }

    /// Payment went through: moves on to the inventory reservation.
    #[tracing::instrument(skip(self), fields(saga_step = "payment_completed"))]
    pub async fn on_payment_completed(
        &self,
        order_id: OrderId,
    ) -> Result<CommandResult<Order>, SagaError> {
        self.run_step(
            SagaStep::PaymentCompleted,
            order_id,
            |o| {
                o.confirm_payment()?;
                o.mark_inventory_pending()
            },
            |o| self.dispatch(SagaCommand::ReserveInventory(ReserveInventory::for_order(o))),
        )
        .await
    }

    /// Payment was declined: the order cancels itself, nothing to undo.
    #[tracing::instrument(skip(self), fields(saga_step = "payment_failed"))]
    pub async fn on_payment_failed(
        &self,
        order_id: OrderId,
    ) -> Result<CommandResult<Order>, SagaError> {
        let result = self
            .run_step(
                SagaStep::PaymentFailed,
                order_id,
                |o| o.fail_payment(),
                |_| async { Ok(()) },
            )
            .await?;

        metrics::counter!("saga_cancelled_total", "reason" => "payment_failed").increment(1);
        tracing::info!("Saga cancelled after payment failure");
        Ok(result)
    }

    /// Stock was reserved: the order completes.
    #[tracing::instrument(skip(self), fields(saga_step = "inventory_reserved"))]
    pub async fn on_inventory_reserved(
        &self,
        order_id: OrderId,
    ) -> Result<CommandResult<Order>, SagaError> {
        let result = self
            .run_step(
                SagaStep::InventoryReserved,
                order_id,
                |o| {
                    o.confirm_inventory()?;
                    o.complete()
                },
                |_| async { Ok(()) },
            )
            .await?;

        metrics::counter!("saga_completed_total").increment(1);
        tracing::info!("Saga completed");
        Ok(result)
    }

    /// Stock was unavailable: records the failure, cancels, and refunds the
    /// payment. A rejected or conflicting step never refunds, and a refund
    /// that cannot be sent puts the order back to wait for redelivery.
    #[tracing::instrument(skip(self), fields(saga_step = "inventory_rejected"))]
    pub async fn on_inventory_rejected(
        &self,
        order_id: OrderId,
    ) -> Result<CommandResult<Order>, SagaError> {
        let result = self
            .run_step(
                SagaStep::InventoryRejected,
                order_id,
                |o| {
                    o.fail_inventory()?;
                    o.cancel()
                },
                |o| self.dispatch(SagaCommand::RefundPayment(RefundPayment::for_order(o))),
            )
            .await?;

        metrics::counter!("saga_compensations_total").increment(1);
        metrics::counter!("saga_cancelled_total", "reason" => "inventory_rejected").increment(1);
        tracing::info!("Saga cancelled after inventory rejection, payment refunded");
        Ok(result)
    }

    async fn run_step<F, T, Fut>(
        &self,
        step: SagaStep,
        order_id: OrderId,
        transition: F,
        then: T,
    ) -> Result<CommandResult<Order>, SagaError>
    where
        F: FnOnce(&mut Order) -> Result<(), OrderError> + Send,
        T: FnOnce(&Order) -> Fut + Send,
        Fut: Future<Output = Result<(), SagaError>> + Send,
    {
        let started = Instant::now();
        let outcome = self.orders.execute_then(order_id, transition, then).await;
        metrics::histogram!("saga_step_duration_seconds", "step" => step.as_str())
            .record(started.elapsed().as_secs_f64());

        match outcome {
            Ok(result) => {
                metrics::counter!("saga_steps_total", "step" => step.as_str()).increment(1);
                tracing::info!(
                    %order_id,
                    status = %result.aggregate.status(),
                    version = %result.new_version,
                    "Saga step applied"
                );
                Ok(result)
            }
            Err(err) => {
                metrics::counter!("saga_step_failures_total", "step" => step.as_str())
                    .increment(1);
                tracing::warn!(%order_id, %step, error = %err, "Saga step not applied");
                Err(err)
            }
        }
    }

    async fn dispatch(&self, command: SagaCommand) -> Result<(), SagaError> {
        let command_type = command.command_type();
        let order_id = command.order_id();

        let sent = match command {
            SagaCommand::ProcessPayment(cmd) => self.payment.process_payment(cmd).await,
            SagaCommand::RefundPayment(cmd) => self.payment.refund_payment(cmd).await,
            SagaCommand::ReserveInventory(cmd) => self.inventory.reserve_inventory(cmd).await,
            SagaCommand::ReleaseInventory(cmd) => self.inventory.release_inventory(cmd).await,
        };

        match &sent {
            Ok(()) => tracing::debug!(%order_id, command = command_type, "Saga command sent"),
            Err(e) => tracing::error!(
                %order_id,
                command = command_type,
                error = %e,
                "Saga command not sent, step will be rolled back"
            ),
        }
        sent
    }

    /// Current status of an order, for diagnostics.
    pub async fn status_of(&self, order_id: OrderId) -> Result<OrderStatus, SagaError> {
        let order = self
            .orders
            .get_order(order_id)
            .await?
            .ok_or(SagaError::OrderNotFound(order_id))?;
        Ok(order.status())
    }
}

#[async_trait]
impl<S, E, P, I> SagaEventHandler for SagaOrchestrator<S, E, P, I>
where
    S: OrderStore,
    E: DomainEventPublisher,
    P: PaymentCommandSender,
    I: InventoryCommandSender,
{
    async fn on_order_created(&self, order_id: OrderId) -> Result<(), SagaError> {
        SagaOrchestrator::on_order_created(self, order_id)
            .await
            .map(|_| ())
    }

    async fn on_payment_completed(&self, order_id: OrderId) -> Result<(), SagaError> {
        SagaOrchestrator::on_payment_completed(self, order_id)
            .await
            .map(|_| ())
    }

    async fn on_payment_failed(&self, order_id: OrderId) -> Result<(), SagaError> {
        SagaOrchestrator::on_payment_failed(self, order_id)
            .await
            .map(|_| ())
    }

    async fn on_inventory_reserved(&self, order_id: OrderId) -> Result<(), SagaError> {
        SagaOrchestrator::on_inventory_reserved(self, order_id)
            .await
            .map(|_| ())
    }

    async fn on_inventory_rejected(&self, order_id: OrderId) -> Result<(), SagaError> {
        SagaOrchestrator::on_inventory_rejected(self, order_id)
            .await
            .map(|_| ())
    }
}
