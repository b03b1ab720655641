//! Demo catalog used by local runs and integration tests.

use rust_decimal::Decimal;

use pedibot_core::domain::product::{Product, ProductId, TenantId};

use crate::repositories::{CatalogRepository, RepositoryError};

pub fn demo_tenant() -> TenantId {
    TenantId("demo-pizzeria".to_string())
}

pub fn demo_catalog(tenant_id: &TenantId) -> Vec<Product> {
    vec![
        Product {
            id: ProductId("demo-pizza-margherita".to_string()),
            tenant_id: tenant_id.clone(),
            name: "Pizza Margherita".to_string(),
            description: Some("Salsa de tomate, mozzarella y albahaca".to_string()),
            price: Decimal::new(1599, 2),
            sku: Some("PZ-001".to_string()),
            available: true,
            stock: Some(5),
            min_stock: Some(2),
            track_stock: true,
        },
        Product {
            id: ProductId("demo-pizza-pepperoni".to_string()),
            tenant_id: tenant_id.clone(),
            name: "Pizza Pepperoni".to_string(),
            description: Some("Con doble pepperoni".to_string()),
            price: Decimal::new(1799, 2),
            sku: Some("PZ-002".to_string()),
            available: true,
            stock: Some(4),
            min_stock: Some(2),
            track_stock: true,
        },
        Product {
            id: ProductId("demo-refresco".to_string()),
            tenant_id: tenant_id.clone(),
            name: "Refresco 600ml".to_string(),
            description: None,
            price: Decimal::new(350, 2),
            sku: None,
            available: true,
            stock: None,
            min_stock: None,
            track_stock: false,
        },
    ]
}

pub async fn seed_demo_tenant(
    catalog: &dyn CatalogRepository,
) -> Result<TenantId, RepositoryError> {
    let tenant_id = demo_tenant();
    for product in demo_catalog(&tenant_id) {
        catalog.save(product).await?;
    }
    Ok(tenant_id)
}

#[cfg(test)]
mod tests {
    use super::{demo_tenant, seed_demo_tenant};
    use crate::repositories::{CatalogRepository, InMemoryStore};

    #[tokio::test]
    async fn seeding_populates_the_demo_catalog() {
        let store = InMemoryStore::new();
        let tenant_id = seed_demo_tenant(&store).await.expect("seed");
        assert_eq!(tenant_id, demo_tenant());

        let catalog = store.list_for_tenant(&tenant_id).await.expect("list");
        assert_eq!(catalog.len(), 3);
        assert!(catalog.iter().any(|product| product.name == "Pizza Margherita"));
    }
}
