//! Order status state machine.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The status of an order in the purchase saga.
///
/// ```text
/// CREATED ──► PAYMENT_PENDING ──► PAYMENT_COMPLETED ──► INVENTORY_PENDING ──► INVENTORY_RESERVED ──► COMPLETED
///    │               │                    │                     │
///    └───────────────┴──► PAYMENT_FAILED  └──► INVENTORY_FAILED ◄┘
///                               │                     │
///                               ▼                     ▼
///                           CANCELLED ◄──────── (any non-terminal)
/// ```
///
/// `COMPLETED` and `CANCELLED` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Created,
    PaymentPending,
    PaymentCompleted,
    PaymentFailed,
    InventoryPending,
    InventoryReserved,
    InventoryFailed,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 9] = [
        OrderStatus::Created,
        OrderStatus::PaymentPending,
        OrderStatus::PaymentCompleted,
        OrderStatus::PaymentFailed,
        OrderStatus::InventoryPending,
        OrderStatus::InventoryReserved,
        OrderStatus::InventoryFailed,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
    ];

    /// Any non-terminal status may (re-)enter `PAYMENT_PENDING`.
    pub fn can_mark_payment_pending(&self) -> bool {
        !self.is_terminal()
    }

    pub fn can_confirm_payment(&self) -> bool {
        matches!(self, OrderStatus::Created | OrderStatus::PaymentPending)
    }

    pub fn can_fail_payment(&self) -> bool {
        matches!(self, OrderStatus::Created | OrderStatus::PaymentPending)
    }

    pub fn can_mark_inventory_pending(&self) -> bool {
        matches!(self, OrderStatus::PaymentCompleted)
    }

    pub fn can_confirm_inventory(&self) -> bool {
        matches!(
            self,
            OrderStatus::PaymentCompleted | OrderStatus::InventoryPending
        )
    }

    pub fn can_fail_inventory(&self) -> bool {
        matches!(
            self,
            OrderStatus::PaymentCompleted | OrderStatus::InventoryPending
        )
    }

    pub fn can_complete(&self) -> bool {
        matches!(self, OrderStatus::InventoryReserved)
    }

    pub fn can_cancel(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Created => "CREATED",
            OrderStatus::PaymentPending => "PAYMENT_PENDING",
            OrderStatus::PaymentCompleted => "PAYMENT_COMPLETED",
            OrderStatus::PaymentFailed => "PAYMENT_FAILED",
            OrderStatus::InventoryPending => "INVENTORY_PENDING",
            OrderStatus::InventoryReserved => "INVENTORY_RESERVED",
            OrderStatus::InventoryFailed => "INVENTORY_FAILED",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not a known order status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown order status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for OrderStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_status_is_created() {
        assert_eq!(OrderStatus::default(), OrderStatus::Created);
    }

    #[test]
    fn terminal_statuses() {
        let terminal: Vec<_> = OrderStatus::ALL
            .into_iter()
            .filter(OrderStatus::is_terminal)
            .collect();
        assert_eq!(terminal, vec![OrderStatus::Completed, OrderStatus::Cancelled]);
    }

    #[test]
    fn payment_outcome_allowed_only_before_payment_settles() {
        for status in OrderStatus::ALL {
            let expected = matches!(status, OrderStatus::Created | OrderStatus::PaymentPending);
            assert_eq!(status.can_confirm_payment(), expected, "{status}");
            assert_eq!(status.can_fail_payment(), expected, "{status}");
        }
    }

    #[test]
    fn inventory_outcome_allowed_after_payment() {
        for status in OrderStatus::ALL {
            let expected = matches!(
                status,
                OrderStatus::PaymentCompleted | OrderStatus::InventoryPending
            );
            assert_eq!(status.can_confirm_inventory(), expected, "{status}");
            assert_eq!(status.can_fail_inventory(), expected, "{status}");
        }
        assert!(OrderStatus::PaymentCompleted.can_mark_inventory_pending());
        assert!(!OrderStatus::InventoryPending.can_mark_inventory_pending());
    }

    #[test]
    fn only_inventory_reserved_can_complete() {
        for status in OrderStatus::ALL {
            assert_eq!(
                status.can_complete(),
                status == OrderStatus::InventoryReserved,
                "{status}"
            );
        }
    }

    #[test]
    fn cancel_and_payment_pending_follow_terminality() {
        for status in OrderStatus::ALL {
            assert_eq!(status.can_cancel(), !status.is_terminal());
            assert_eq!(status.can_mark_payment_pending(), !status.is_terminal());
        }
    }

    #[test]
    fn string_form_round_trips() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>(), Ok(status));
        }
        assert_eq!(
            "SHIPPED".parse::<OrderStatus>(),
            Err(UnknownStatus("SHIPPED".to_string()))
        );
    }

    #[test]
    fn serde_uses_wire_names() {
        let json = serde_json::to_string(&OrderStatus::InventoryReserved).unwrap();
        assert_eq!(json, "\"INVENTORY_RESERVED\"");
    }
}
