use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductId(pub String);

/// A catalog entry owned by one tenant. `stock` and `min_stock` are only
/// meaningful while `track_stock` is set; untracked products are limited by
/// the `available` flag alone.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub tenant_id: TenantId,
    pub name: String,
    pub description: Option<String>,
    pub price: Decimal,
    pub sku: Option<String>,
    pub available: bool,
    pub stock: Option<i64>,
    pub min_stock: Option<i64>,
    pub track_stock: bool,
}

impl Product {
    pub fn can_fulfill(&self, quantity: u32) -> bool {
        if !self.available {
            return false;
        }
        if !self.track_stock {
            return true;
        }
        self.stock.map(|stock| stock >= i64::from(quantity)).unwrap_or(false)
    }

    pub fn is_low_stock(&self) -> bool {
        if !self.track_stock {
            return false;
        }
        match (self.stock, self.min_stock) {
            (Some(stock), Some(min_stock)) => stock <= min_stock,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{Product, ProductId, TenantId};

    fn product(available: bool, track_stock: bool, stock: Option<i64>) -> Product {
        Product {
            id: ProductId("prod-1".to_string()),
            tenant_id: TenantId("tenant-1".to_string()),
            name: "Pizza Margherita".to_string(),
            description: None,
            price: Decimal::new(1599, 2),
            sku: None,
            available,
            stock,
            min_stock: Some(2),
            track_stock,
        }
    }

    #[test]
    fn untracked_product_fulfills_any_quantity_while_available() {
        assert!(product(true, false, None).can_fulfill(50));
        assert!(!product(false, false, None).can_fulfill(1));
    }

    #[test]
    fn tracked_product_is_limited_by_stock() {
        assert!(product(true, true, Some(3)).can_fulfill(3));
        assert!(!product(true, true, Some(3)).can_fulfill(4));
        assert!(!product(true, true, None).can_fulfill(1));
    }

    #[test]
    fn low_stock_requires_tracking_and_threshold() {
        assert!(product(true, true, Some(2)).is_low_stock());
        assert!(!product(true, true, Some(3)).is_low_stock());
        assert!(!product(true, false, Some(1)).is_low_stock());
    }
}
