//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::OrderId;
use order_store::Version;

use crate::aggregate::Aggregate;

use super::{Money, OrderError, OrderEvent, OrderStatus, ProductId, UserId};

/// Order aggregate root.
///
/// Identity, user, product, price, and creation time are fixed at creation.
/// Status only moves through the behavior methods below; each one checks the
/// current status first and leaves the order untouched when it refuses.
#[derive(Debug, Clone)]
pub struct Order {
    id: OrderId,
    user_id: UserId,
    product_id: ProductId,
    price: Money,
    status: OrderStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: Version,
    pending_events: Vec<OrderEvent>,
}

impl Aggregate for Order {
    type Id = OrderId;
    type Event = OrderEvent;
    type Error = OrderError;

    fn id(&self) -> OrderId {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn pending_events(&self) -> &[OrderEvent] {
        &self.pending_events
    }

    fn take_events(&mut self) -> Vec<OrderEvent> {
        std::mem::take(&mut self.pending_events)
    }
}

// Construction
impl Order {
    /// Places a new order in `CREATED` status and records `OrderCreated`.
    pub fn create(user_id: UserId, product_id: ProductId, price: Money) -> Self {
        Self::create_with_id(OrderId::new(), user_id, product_id, price)
    }

    pub fn create_with_id(
        id: OrderId,
        user_id: UserId,
        product_id: ProductId,
        price: Money,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            user_id,
            product_id,
            price,
            status: OrderStatus::Created,
            created_at: now,
            updated_at: now,
            version: Version::initial(),
            pending_events: vec![OrderEvent::order_created(
                id, user_id, product_id, price, now,
            )],
        }
    }

    /// Rebuilds an order from stored state. Records no events.
    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        id: OrderId,
        user_id: UserId,
        product_id: ProductId,
        price: Money,
        status: OrderStatus,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        version: Version,
    ) -> Self {
        Self {
            id,
            user_id,
            product_id,
            price,
            status,
            created_at,
            updated_at,
            version,
            pending_events: Vec::new(),
        }
    }
}

// Query methods
impl Order {
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn price(&self) -> Money {
        self.price
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

// Behavior methods
impl Order {
    /// First forward step of the saga. Accepted from any non-terminal status.
    pub fn mark_payment_pending(&mut self) -> Result<(), OrderError> {
        self.ensure(
            self.status.can_mark_payment_pending(),
            "mark payment pending",
        )?;
        self.change_status(OrderStatus::PaymentPending);
        Ok(())
    }

    pub fn confirm_payment(&mut self) -> Result<(), OrderError> {
        self.ensure(self.status.can_confirm_payment(), "confirm payment")?;
        self.change_status(OrderStatus::PaymentCompleted);
        Ok(())
    }

    /// Records the payment failure and cancels the order in the same call,
    /// producing two status change events.
    pub fn fail_payment(&mut self) -> Result<(), OrderError> {
        self.ensure(self.status.can_fail_payment(), "fail payment")?;
        self.change_status(OrderStatus::PaymentFailed);
        self.change_status(OrderStatus::Cancelled);
        Ok(())
    }

    pub fn mark_inventory_pending(&mut self) -> Result<(), OrderError> {
        self.ensure(
            self.status.can_mark_inventory_pending(),
            "mark inventory pending",
        )?;
        self.change_status(OrderStatus::InventoryPending);
        Ok(())
    }

    pub fn confirm_inventory(&mut self) -> Result<(), OrderError> {
        self.ensure(self.status.can_confirm_inventory(), "confirm inventory")?;
        self.change_status(OrderStatus::InventoryReserved);
        Ok(())
    }

    /// Unlike `fail_payment`, does not cancel: the caller must refund first.
    pub fn fail_inventory(&mut self) -> Result<(), OrderError> {
        self.ensure(self.status.can_fail_inventory(), "fail inventory")?;
        self.change_status(OrderStatus::InventoryFailed);
        Ok(())
    }

    pub fn complete(&mut self) -> Result<(), OrderError> {
        self.ensure(self.status.can_complete(), "complete")?;
        self.change_status(OrderStatus::Completed);
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), OrderError> {
        self.ensure(self.status.can_cancel(), "cancel")?;
        self.change_status(OrderStatus::Cancelled);
        Ok(())
    }

    fn ensure(&self, allowed: bool, action: &'static str) -> Result<(), OrderError> {
        if allowed {
            Ok(())
        } else {
            Err(OrderError::InvalidStateTransition {
                current_status: self.status,
                action,
            })
        }
    }

    fn change_status(&mut self, new_status: OrderStatus) {
        let previous_status = self.status;
        let now = Utc::now();
        self.status = new_status;
        self.updated_at = now;
        self.pending_events.push(OrderEvent::status_changed(
            self.id,
            previous_status,
            new_status,
            now,
        ));
    }
}
