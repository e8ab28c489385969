//! Order domain events.

use chrono::{DateTime, Utc};
use common::{EventId, OrderId};
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::{Money, OrderStatus, ProductId, UserId};

/// Events recorded by the order aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    OrderCreated(OrderCreatedData),

    /// Recorded once per status transition.
    OrderStatusChanged(OrderStatusChangedData),
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderCreated(_) => "order.created",
            OrderEvent::OrderStatusChanged(_) => "order.status.changed",
        }
    }

    fn event_id(&self) -> EventId {
        match self {
            OrderEvent::OrderCreated(data) => data.event_id,
            OrderEvent::OrderStatusChanged(data) => data.event_id,
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::OrderCreated(data) => data.occurred_at,
            OrderEvent::OrderStatusChanged(data) => data.occurred_at,
        }
    }
}

/// Data for OrderCreated event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderCreatedData {
    pub event_id: EventId,
    pub occurred_at: DateTime<Utc>,
    pub order_id: OrderId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub amount: Money,
}

/// Data for OrderStatusChanged event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatusChangedData {
    pub event_id: EventId,
    pub occurred_at: DateTime<Utc>,
    pub order_id: OrderId,
    pub previous_status: OrderStatus,
    pub new_status: OrderStatus,
}

// Convenience constructors
impl OrderEvent {
    pub fn order_created(
        order_id: OrderId,
        user_id: UserId,
        product_id: ProductId,
        amount: Money,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        OrderEvent::OrderCreated(OrderCreatedData {
            event_id: EventId::new(),
            occurred_at,
            order_id,
            user_id,
            product_id,
            amount,
        })
    }

    pub fn status_changed(
        order_id: OrderId,
        previous_status: OrderStatus,
        new_status: OrderStatus,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        OrderEvent::OrderStatusChanged(OrderStatusChangedData {
            event_id: EventId::new(),
            occurred_at,
            order_id,
            previous_status,
            new_status,
        })
    }

    pub fn order_id(&self) -> OrderId {
        match self {
            OrderEvent::OrderCreated(data) => data.order_id,
            OrderEvent::OrderStatusChanged(data) => data.order_id,
        }
    }

    /// `(previous, new)` for status changes, None otherwise.
    pub fn transition(&self) -> Option<(OrderStatus, OrderStatus)> {
        match self {
            OrderEvent::OrderStatusChanged(data) => Some((data.previous_status, data.new_status)),
            OrderEvent::OrderCreated(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn created() -> OrderEvent {
        OrderEvent::order_created(
            OrderId::new(),
            UserId::new(1).unwrap(),
            ProductId::new(2).unwrap(),
            Money::from_cents(1_500).unwrap(),
            Utc::now(),
        )
    }

    #[test]
    fn event_type_names() {
        assert_eq!(created().event_type(), "order.created");
        let changed = OrderEvent::status_changed(
            OrderId::new(),
            OrderStatus::Created,
            OrderStatus::PaymentPending,
            Utc::now(),
        );
        assert_eq!(changed.event_type(), "order.status.changed");
        assert_eq!(
            changed.transition(),
            Some((OrderStatus::Created, OrderStatus::PaymentPending))
        );
        assert_eq!(created().transition(), None);
    }

    #[test]
    fn every_event_gets_its_own_id() {
        assert_ne!(created().event_id(), created().event_id());
    }

    #[test]
    fn serialized_with_type_tag() {
        let event = created();
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "OrderCreated");
        assert_eq!(json["data"]["amount"], "15.00");
        assert_eq!(json["data"]["user_id"], 1);

        let back: OrderEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
