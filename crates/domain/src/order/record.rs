//! Mapping between the order aggregate and its storage row.

use order_store::{OrderRecord, OrderStoreError};

use crate::aggregate::Aggregate;

use super::{Money, Order, OrderStatus, ProductId, UserId};

impl Order {
    pub fn to_record(&self) -> OrderRecord {
        OrderRecord {
            id: self.id(),
            user_id: self.user_id().value(),
            product_id: self.product_id().value(),
            price_cents: self.price().cents(),
            status: self.status().as_str().to_string(),
            created_at: self.created_at(),
            updated_at: self.updated_at(),
            version: self.version(),
        }
    }
}

impl TryFrom<OrderRecord> for Order {
    type Error = OrderStoreError;

    fn try_from(record: OrderRecord) -> Result<Self, Self::Error> {
        let invalid = |reason: String| OrderStoreError::InvalidRecord {
            order_id: record.id,
            reason,
        };

        let status: OrderStatus = record.status.parse().map_err(|e| invalid(format!("{e}")))?;
        let user_id = UserId::new(record.user_id).map_err(|e| invalid(e.to_string()))?;
        let product_id = ProductId::new(record.product_id).map_err(|e| invalid(e.to_string()))?;
        let price = Money::from_cents(record.price_cents).map_err(|e| invalid(e.to_string()))?;

        Ok(Order::reconstitute(
            record.id,
            user_id,
            product_id,
            price,
            status,
            record.created_at,
            record.updated_at,
            record.version,
        ))
    }
}

#[cfg(test)]
mod tests {
    use order_store::Version;

    use super::*;

    fn order() -> Order {
        Order::create(
            UserId::new(3).unwrap(),
            ProductId::new(4).unwrap(),
            Money::from_cents(2_550).unwrap(),
        )
    }

    #[test]
    fn record_carries_flat_fields() {
        let order = order();
        let record = order.to_record();

        assert_eq!(record.id, order.id());
        assert_eq!(record.user_id, 3);
        assert_eq!(record.product_id, 4);
        assert_eq!(record.price_cents, 2_550);
        assert_eq!(record.status, "CREATED");
        assert_eq!(record.version, Version::initial());
    }

    #[test]
    fn record_maps_back_without_events() {
        let mut original = order();
        original.mark_payment_pending().unwrap();
        let mut record = original.to_record();
        record.version = Version::new(2);

        let restored = Order::try_from(record).unwrap();

        assert_eq!(restored.id(), original.id());
        assert_eq!(restored.status(), OrderStatus::PaymentPending);
        assert_eq!(restored.price(), original.price());
        assert_eq!(restored.updated_at(), original.updated_at());
        assert_eq!(restored.version(), Version::new(2));
        assert!(!restored.has_pending_events());
    }

    #[test]
    fn unknown_stored_status_is_an_invalid_record() {
        let mut record = order().to_record();
        record.status = "SHIPPED".to_string();

        let err = Order::try_from(record).unwrap_err();

        assert!(matches!(err, OrderStoreError::InvalidRecord { .. }));
    }

    #[test]
    fn negative_stored_price_is_an_invalid_record() {
        let mut record = order().to_record();
        record.price_cents = -5;
        assert!(Order::try_from(record).is_err());
    }
}
