//! Outbound saga commands.
//!
//! Commands are fire-and-forget. The order id is the only correlation token;
//! replies are matched back to the order through it.

use common::OrderId;
use domain::{Aggregate, Money, Order, ProductId, UserId};

/// Charge the user for the order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessPayment {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub amount: Money,
}

impl ProcessPayment {
    pub fn for_order(order: &Order) -> Self {
        Self {
            order_id: order.id(),
            user_id: order.user_id(),
            product_id: order.product_id(),
            amount: order.price(),
        }
    }
}

/// Give back whatever was charged for the order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundPayment {
    pub order_id: OrderId,
    pub user_id: UserId,
}

impl RefundPayment {
    pub fn for_order(order: &Order) -> Self {
        Self {
            order_id: order.id(),
            user_id: order.user_id(),
        }
    }
}

/// Take one unit of the product out of stock for the order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReserveInventory {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub product_id: ProductId,
}

impl ReserveInventory {
    pub fn for_order(order: &Order) -> Self {
        Self {
            order_id: order.id(),
            user_id: order.user_id(),
            product_id: order.product_id(),
        }
    }
}

/// Put a reserved unit back into stock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseInventory {
    pub order_id: OrderId,
    pub product_id: ProductId,
}

impl ReleaseInventory {
    pub fn for_order(order: &Order) -> Self {
        Self {
            order_id: order.id(),
            product_id: order.product_id(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SagaCommand {
    ProcessPayment(ProcessPayment),
    RefundPayment(RefundPayment),
    ReserveInventory(ReserveInventory),
    ReleaseInventory(ReleaseInventory),
}

impl SagaCommand {
    pub fn command_type(&self) -> &'static str {
        match self {
            SagaCommand::ProcessPayment(_) => "ProcessPayment",
            SagaCommand::RefundPayment(_) => "RefundPayment",
            SagaCommand::ReserveInventory(_) => "ReserveInventory",
            SagaCommand::ReleaseInventory(_) => "ReleaseInventory",
        }
    }

    pub fn order_id(&self) -> OrderId {
        match self {
            SagaCommand::ProcessPayment(c) => c.order_id,
            SagaCommand::RefundPayment(c) => c.order_id,
            SagaCommand::ReserveInventory(c) => c.order_id,
            SagaCommand::ReleaseInventory(c) => c.order_id,
        }
    }

    /// True for commands that undo an earlier step.
    pub fn is_compensation(&self) -> bool {
        matches!(
            self,
            SagaCommand::RefundPayment(_) | SagaCommand::ReleaseInventory(_)
        )
    }
}
