//! Order commands.

use common::OrderId;

use crate::command::Command;

use super::{Money, Order, OrderError, ProductId, UserId};

/// Command to place a new order.
#[derive(Debug, Clone)]
pub struct CreateOrder {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub price: Money,
}

impl CreateOrder {
    /// Creates a CreateOrder command with a generated order ID.
    pub fn new(user_id: UserId, product_id: ProductId, price: Money) -> Self {
        Self {
            order_id: OrderId::new(),
            user_id,
            product_id,
            price,
        }
    }

    /// Validates raw request input. Fails before anything is created when an
    /// id is not positive or the amount is negative or not finite.
    pub fn from_request(user_id: i64, product_id: i64, amount: f64) -> Result<Self, OrderError> {
        Ok(Self::new(
            UserId::new(user_id)?,
            ProductId::new(product_id)?,
            Money::from_decimal(amount)?,
        ))
    }
}

impl Command for CreateOrder {
    type Aggregate = Order;

    fn aggregate_id(&self) -> OrderId {
        self.order_id
    }
}

/// Command for a user-initiated cancellation.
#[derive(Debug, Clone)]
pub struct CancelOrder {
    pub order_id: OrderId,
}

impl CancelOrder {
    pub fn new(order_id: OrderId) -> Self {
        Self { order_id }
    }
}

impl Command for CancelOrder {
    type Aggregate = Order;

    fn aggregate_id(&self) -> OrderId {
        self.order_id
    }
}
