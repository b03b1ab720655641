use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row};

use pedibot_core::domain::product::{Product, ProductId, TenantId};

use super::{parse_decimal, CatalogRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCatalogRepository {
    pool: DbPool,
}

impl SqlCatalogRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl CatalogRepository for SqlCatalogRepository {
    async fn list_for_tenant(&self, tenant_id: &TenantId) -> Result<Vec<Product>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT
                id,
                tenant_id,
                name,
                description,
                price,
                sku,
                available,
                stock,
                min_stock,
                track_stock
             FROM product
             WHERE tenant_id = ?
             ORDER BY name ASC",
        )
        .bind(&tenant_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(product_from_row).collect()
    }

    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query(
            "SELECT
                id,
                tenant_id,
                name,
                description,
                price,
                sku,
                available,
                stock,
                min_stock,
                track_stock
             FROM product
             WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(product_from_row).transpose()
    }

    async fn save(&self, product: Product) -> Result<(), RepositoryError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO product (
                id,
                tenant_id,
                name,
                description,
                price,
                sku,
                available,
                stock,
                min_stock,
                track_stock,
                created_at,
                updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                tenant_id = excluded.tenant_id,
                name = excluded.name,
                description = excluded.description,
                price = excluded.price,
                sku = excluded.sku,
                available = excluded.available,
                stock = excluded.stock,
                min_stock = excluded.min_stock,
                track_stock = excluded.track_stock,
                updated_at = excluded.updated_at",
        )
        .bind(&product.id.0)
        .bind(&product.tenant_id.0)
        .bind(&product.name)
        .bind(product.description.as_deref())
        .bind(product.price.to_string())
        .bind(product.sku.as_deref())
        .bind(product.available)
        .bind(product.stock)
        .bind(product.min_stock)
        .bind(product.track_stock)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

pub(crate) fn product_from_row(row: SqliteRow) -> Result<Product, RepositoryError> {
    Ok(Product {
        id: ProductId(row.try_get("id")?),
        tenant_id: TenantId(row.try_get("tenant_id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        price: parse_decimal("price", row.try_get("price")?)?,
        sku: row.try_get("sku")?,
        available: row.try_get("available")?,
        stock: row.try_get("stock")?,
        min_stock: row.try_get("min_stock")?,
        track_stock: row.try_get("track_stock")?,
    })
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use pedibot_core::domain::product::{Product, ProductId, TenantId};

    use super::SqlCatalogRepository;
    use crate::repositories::CatalogRepository;
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:?cache=shared", 1, 30)
            .await
            .expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }

    // The shared-cache test database is process-wide, so every test works
    // against its own tenant and product ids.
    fn product(id: &str, tenant: &str, name: &str) -> Product {
        Product {
            id: ProductId(id.to_string()),
            tenant_id: TenantId(tenant.to_string()),
            name: name.to_string(),
            description: Some("Horneada al momento".to_string()),
            price: Decimal::new(1599, 2),
            sku: Some("PZ-001".to_string()),
            available: true,
            stock: Some(5),
            min_stock: Some(2),
            track_stock: true,
        }
    }

    #[tokio::test]
    async fn save_and_list_is_tenant_scoped_and_name_ordered() {
        let pool = setup_pool().await;
        let repo = SqlCatalogRepository::new(pool.clone());

        repo.save(product("cat-list-2", "tenant-cat-list", "Refresco 600ml"))
            .await
            .expect("save refresco");
        repo.save(product("cat-list-1", "tenant-cat-list", "Pizza Margherita"))
            .await
            .expect("save pizza");
        repo.save(product("cat-list-3", "tenant-cat-other", "Camisa blanca"))
            .await
            .expect("save other tenant");

        let catalog = repo
            .list_for_tenant(&TenantId("tenant-cat-list".to_string()))
            .await
            .expect("list catalog");

        let names: Vec<&str> = catalog.iter().map(|item| item.name.as_str()).collect();
        assert_eq!(names, vec!["Pizza Margherita", "Refresco 600ml"]);

        pool.close().await;
    }

    #[tokio::test]
    async fn save_round_trips_price_and_stock_fields() {
        let pool = setup_pool().await;
        let repo = SqlCatalogRepository::new(pool.clone());

        let original = product("cat-rt-1", "tenant-cat-rt", "Pizza Margherita");
        repo.save(original.clone()).await.expect("save");

        let found = repo
            .find_by_id(&ProductId("cat-rt-1".to_string()))
            .await
            .expect("find")
            .expect("product exists");
        assert_eq!(found, original);

        pool.close().await;
    }

    #[tokio::test]
    async fn save_updates_existing_product() {
        let pool = setup_pool().await;
        let repo = SqlCatalogRepository::new(pool.clone());

        let mut item = product("cat-upd-1", "tenant-cat-upd", "Pizza Margherita");
        repo.save(item.clone()).await.expect("save");

        item.price = Decimal::new(1799, 2);
        item.stock = Some(8);
        repo.save(item.clone()).await.expect("update");

        let found = repo
            .find_by_id(&ProductId("cat-upd-1".to_string()))
            .await
            .expect("find")
            .expect("product exists");
        assert_eq!(found.price, Decimal::new(1799, 2));
        assert_eq!(found.stock, Some(8));

        pool.close().await;
    }
}
