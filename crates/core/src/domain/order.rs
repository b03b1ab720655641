use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::message::MessageId;
use crate::domain::product::{ProductId, TenantId};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub String);

/// Stored in the tenants' language; `Pending` is the only status this
/// pipeline ever writes, the rest belong to the external fulfillment flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDIENTE",
            Self::Confirmed => "CONFIRMADO",
            Self::Preparing => "PREPARANDO",
            Self::Delivered => "ENTREGADO",
            Self::Cancelled => "CANCELADO",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PENDIENTE" => Some(Self::Pending),
            "CONFIRMADO" => Some(Self::Confirmed),
            "PREPARANDO" => Some(Self::Preparing),
            "ENTREGADO" => Some(Self::Delivered),
            "CANCELADO" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// Price and name are snapshots taken at commit time; later catalog edits
/// never reach back into a placed order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
}

impl OrderLine {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub tenant_id: TenantId,
    pub customer_phone: String,
    pub customer_name: Option<String>,
    pub lines: Vec<OrderLine>,
    pub total: Decimal,
    pub status: OrderStatus,
    pub source_message_id: MessageId,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn computed_total(&self) -> Decimal {
        self.lines.iter().map(OrderLine::line_total).sum()
    }

    pub fn totals_consistent(&self) -> bool {
        self.total == self.computed_total()
    }
}

/// Input to `OrderStore::commit`; the store assigns id, status, timestamp
/// and the final price snapshots.
#[derive(Clone, Debug, PartialEq)]
pub struct NewOrder {
    pub tenant_id: TenantId,
    pub customer_phone: String,
    pub customer_name: Option<String>,
    pub lines: Vec<OrderLine>,
    pub source_message_id: MessageId,
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use crate::domain::message::MessageId;
    use crate::domain::product::{ProductId, TenantId};

    use super::{Order, OrderId, OrderLine, OrderStatus};

    fn line(quantity: u32, unit_price_cents: i64) -> OrderLine {
        OrderLine {
            product_id: ProductId("prod-1".to_string()),
            product_name: "Pizza Margherita".to_string(),
            quantity,
            unit_price: Decimal::new(unit_price_cents, 2),
        }
    }

    #[test]
    fn order_total_is_sum_of_line_totals() {
        let order = Order {
            id: OrderId("ord-1".to_string()),
            tenant_id: TenantId("tenant-1".to_string()),
            customer_phone: "+5215512345678".to_string(),
            customer_name: None,
            lines: vec![line(2, 1599), line(1, 350)],
            total: Decimal::new(3548, 2),
            status: OrderStatus::Pending,
            source_message_id: MessageId("msg-1".to_string()),
            created_at: Utc::now(),
        };

        assert_eq!(order.computed_total(), Decimal::new(3548, 2));
        assert!(order.totals_consistent());
    }

    #[test]
    fn status_round_trips_through_storage_form() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Preparing,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(OrderStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(OrderStatus::parse("pendiente"), None);
    }
}
