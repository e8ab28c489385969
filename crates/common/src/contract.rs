//! Wire contract shared by the order service and its payment and inventory
//! collaborators.
//!
//! Every message is JSON with camelCase field names. Status values travel as
//! SCREAMING_SNAKE_CASE strings; values this side does not know deserialize
//! into the `Other` variant instead of failing, so newer producers never break
//! older consumers.

use serde::{Deserialize, Serialize};

use crate::OrderId;

/// Topic names.
pub mod topics {
    /// Order lifecycle events. The order service both publishes `ORDER_CREATED`
    /// here and consumes it to start the saga.
    pub const ORDER_EVENTS: &str = "order-events";
    /// Replies from the payment service.
    pub const PAYMENT_EVENTS: &str = "payment-events";
    /// Replies from the inventory service.
    pub const INVENTORY_EVENTS: &str = "inventory-events";
    /// Commands for the payment service.
    pub const PAYMENT_COMMANDS: &str = "payment-commands-out";
    /// Commands for the inventory service.
    pub const INVENTORY_COMMANDS: &str = "inventory-commands-out";
}

/// A payment command carrying this amount is a refund, not a charge.
///
/// A legitimately free order is indistinguishable from a refund on the wire.
pub const REFUND_AMOUNT: f64 = 0.0;

/// Product id written into refund commands, which carry no product.
pub const REFUND_PRODUCT_ID: i64 = 0;

/// An inventory command carrying this user id is a release, not a reservation.
pub const RELEASE_USER_ID: i64 = 0;

macro_rules! wire_status {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $wire:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(from = "String", into = "String")]
        pub enum $name {
            $($variant,)+
            /// A status value this service does not recognize.
            Other(String),
        }

        impl $name {
            pub fn as_str(&self) -> &str {
                match self {
                    $(Self::$variant => $wire,)+
                    Self::Other(raw) => raw,
                }
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                match raw.as_str() {
                    $($wire => Self::$variant,)+
                    _ => Self::Other(raw),
                }
            }
        }

        impl From<$name> for String {
            fn from(status: $name) -> Self {
                match status {
                    $($name::$variant => $wire.to_string(),)+
                    $name::Other(raw) => raw,
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::Other(String::new())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

wire_status!(
    /// Status carried by messages on `order-events`.
    OrderEventStatus {
        OrderCreated => "ORDER_CREATED",
    }
);

wire_status!(
    /// Status carried by messages on `payment-events`.
    PaymentEventStatus {
        PaymentCompleted => "PAYMENT_COMPLETED",
        PaymentFailed => "PAYMENT_FAILED",
    }
);

wire_status!(
    /// Status carried by messages on `inventory-events`.
    InventoryEventStatus {
        InventoryReserved => "INVENTORY_RESERVED",
        InventoryRejected => "INVENTORY_REJECTED",
    }
);

/// Order payload of an order event.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrderRequestDto {
    pub user_id: i64,
    pub product_id: i64,
    pub amount: f64,
    pub order_id: Option<OrderId>,
}

/// Payment command payload, also echoed back inside payment events.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PaymentRequestDto {
    pub order_id: Option<OrderId>,
    pub user_id: i64,
    pub product_id: i64,
    pub amount: f64,
}

impl PaymentRequestDto {
    /// True when this command asks for a refund of the order's transaction.
    pub fn is_refund(&self) -> bool {
        self.amount == REFUND_AMOUNT
    }
}

/// Inventory command payload, also echoed back inside inventory events.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InventoryRequestDto {
    pub order_id: Option<OrderId>,
    pub user_id: i64,
    pub product_id: i64,
}

impl InventoryRequestDto {
    /// True when this command returns a previously reserved unit to stock.
    pub fn is_release(&self) -> bool {
        self.user_id == RELEASE_USER_ID
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OrderEventMessage {
    pub order_request: Option<OrderRequestDto>,
    pub status: OrderEventStatus,
}

impl OrderEventMessage {
    pub fn order_id(&self) -> Option<OrderId> {
        self.order_request.as_ref().and_then(|r| r.order_id)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PaymentEventMessage {
    pub payment_request: Option<PaymentRequestDto>,
    pub status: PaymentEventStatus,
}

impl PaymentEventMessage {
    pub fn order_id(&self) -> Option<OrderId> {
        self.payment_request.as_ref().and_then(|r| r.order_id)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InventoryEventMessage {
    pub inventory_request: Option<InventoryRequestDto>,
    pub status: InventoryEventStatus,
}

impl InventoryEventMessage {
    pub fn order_id(&self) -> Option<OrderId> {
        self.inventory_request.as_ref().and_then(|r| r.order_id)
    }
}
