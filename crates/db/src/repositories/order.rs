use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row};
use uuid::Uuid;

use pedibot_core::domain::message::MessageId;
use pedibot_core::domain::order::{NewOrder, Order, OrderId, OrderLine, OrderStatus};
use pedibot_core::domain::product::{ProductId, TenantId};

use super::{parse_decimal, parse_timestamp, parse_u32, OrderCommitOutcome, OrderStore, RepositoryError};
use crate::DbPool;

pub struct SqlOrderStore {
    pool: DbPool,
}

impl SqlOrderStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn load_order(&self, row: SqliteRow) -> Result<Order, RepositoryError> {
        let order_id: String = row.try_get("id")?;

        let line_rows = sqlx::query(
            "SELECT product_id, product_name, quantity, unit_price
             FROM order_line
             WHERE order_id = ?
             ORDER BY rowid ASC",
        )
        .bind(&order_id)
        .fetch_all(&self.pool)
        .await?;

        let lines = line_rows
            .into_iter()
            .map(|line_row| {
                Ok(OrderLine {
                    product_id: ProductId(line_row.try_get("product_id")?),
                    product_name: line_row.try_get("product_name")?,
                    quantity: parse_u32("quantity", line_row.try_get("quantity")?)?,
                    unit_price: parse_decimal("unit_price", line_row.try_get("unit_price")?)?,
                })
            })
            .collect::<Result<Vec<_>, RepositoryError>>()?;

        let status_raw: String = row.try_get("status")?;
        let status = OrderStatus::parse(&status_raw).ok_or_else(|| {
            RepositoryError::Decode(format!("unknown order status `{status_raw}`"))
        })?;

        Ok(Order {
            id: OrderId(order_id),
            tenant_id: TenantId(row.try_get("tenant_id")?),
            customer_phone: row.try_get("customer_phone")?,
            customer_name: row.try_get("customer_name")?,
            lines,
            total: parse_decimal("total", row.try_get("total")?)?,
            status,
            source_message_id: MessageId(row.try_get("source_message_id")?),
            created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        })
    }
}

#[async_trait::async_trait]
impl OrderStore for SqlOrderStore {
    async fn commit(&self, order: NewOrder) -> Result<OrderCommitOutcome, RepositoryError> {
        let NewOrder { tenant_id, customer_phone, customer_name, mut lines, source_message_id } =
            order;

        let mut tx = self.pool.begin().await?;

        // Dedup on the source message; a redelivered job must find the order
        // it already produced instead of producing a second one.
        let existing = sqlx::query("SELECT id FROM customer_order WHERE source_message_id = ?")
            .bind(&source_message_id.0)
            .fetch_optional(&mut *tx)
            .await?;
        if let Some(row) = existing {
            return Ok(OrderCommitOutcome::DuplicateSource { existing: OrderId(row.try_get("id")?) });
        }

        let now = Utc::now();

        for line in &mut lines {
            let product_row = sqlx::query(
                "SELECT price, available, stock, track_stock
                 FROM product
                 WHERE id = ? AND tenant_id = ?",
            )
            .bind(&line.product_id.0)
            .bind(&tenant_id.0)
            .fetch_optional(&mut *tx)
            .await?;

            let Some(product_row) = product_row else {
                return Ok(OrderCommitOutcome::ProductMissing {
                    product_name: line.product_name.clone(),
                });
            };

            let available: bool = product_row.try_get("available")?;
            let track_stock: bool = product_row.try_get("track_stock")?;
            let stock: Option<i64> = product_row.try_get("stock")?;

            if !available {
                return Ok(OrderCommitOutcome::InsufficientStock {
                    product_name: line.product_name.clone(),
                    available: 0,
                });
            }

            // The persisted unit price is the catalog price as of this
            // transaction, not the one validation saw.
            line.unit_price = parse_decimal("price", product_row.try_get("price")?)?;

            if track_stock {
                // Conditional decrement: the WHERE clause re-checks stock at
                // commit time so a concurrent order cannot drive it negative.
                let updated = sqlx::query(
                    "UPDATE product
                     SET stock = stock - ?, updated_at = ?
                     WHERE id = ? AND stock >= ?",
                )
                .bind(i64::from(line.quantity))
                .bind(now.to_rfc3339())
                .bind(&line.product_id.0)
                .bind(i64::from(line.quantity))
                .execute(&mut *tx)
                .await?
                .rows_affected();

                if updated == 0 {
                    return Ok(OrderCommitOutcome::InsufficientStock {
                        product_name: line.product_name.clone(),
                        available: stock.unwrap_or(0),
                    });
                }
            }
        }

        let order_id = OrderId(Uuid::new_v4().to_string());
        let total: rust_decimal::Decimal = lines.iter().map(OrderLine::line_total).sum();

        let inserted = sqlx::query(
            "INSERT INTO customer_order (
                id,
                tenant_id,
                customer_phone,
                customer_name,
                total,
                status,
                source_message_id,
                created_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&order_id.0)
        .bind(&tenant_id.0)
        .bind(&customer_phone)
        .bind(customer_name.as_deref())
        .bind(total.to_string())
        .bind(OrderStatus::Pending.as_str())
        .bind(&source_message_id.0)
        .bind(now.to_rfc3339())
        .execute(&mut *tx)
        .await;

        if let Err(error) = inserted {
            // UNIQUE backstop for a writer that committed between our read
            // and this insert.
            let duplicate = error
                .as_database_error()
                .map(|db_error| db_error.is_unique_violation())
                .unwrap_or(false);
            if duplicate {
                drop(tx);
                let row = sqlx::query("SELECT id FROM customer_order WHERE source_message_id = ?")
                    .bind(&source_message_id.0)
                    .fetch_one(&self.pool)
                    .await?;
                return Ok(OrderCommitOutcome::DuplicateSource {
                    existing: OrderId(row.try_get("id")?),
                });
            }
            return Err(error.into());
        }

        for line in &lines {
            sqlx::query(
                "INSERT INTO order_line (
                    id,
                    order_id,
                    product_id,
                    product_name,
                    quantity,
                    unit_price
                 ) VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&order_id.0)
            .bind(&line.product_id.0)
            .bind(&line.product_name)
            .bind(i64::from(line.quantity))
            .bind(line.unit_price.to_string())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(OrderCommitOutcome::Created(Order {
            id: order_id,
            tenant_id,
            customer_phone,
            customer_name,
            lines,
            total,
            status: OrderStatus::Pending,
            source_message_id,
            created_at: now,
        }))
    }

    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query(
            "SELECT
                id,
                tenant_id,
                customer_phone,
                customer_name,
                total,
                status,
                source_message_id,
                created_at
             FROM customer_order
             WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => self.load_order(row).await.map(Some),
            None => Ok(None),
        }
    }

    async fn find_by_source_message(
        &self,
        message_id: &MessageId,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query(
            "SELECT
                id,
                tenant_id,
                customer_phone,
                customer_name,
                total,
                status,
                source_message_id,
                created_at
             FROM customer_order
             WHERE source_message_id = ?",
        )
        .bind(&message_id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => self.load_order(row).await.map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use sqlx::Row;

    use pedibot_core::domain::message::MessageId;
    use pedibot_core::domain::order::{NewOrder, OrderLine, OrderStatus};
    use pedibot_core::domain::product::{Product, ProductId, TenantId};

    use super::SqlOrderStore;
    use crate::repositories::{CatalogRepository, OrderCommitOutcome, OrderStore, SqlCatalogRepository};
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:?cache=shared", 1, 30)
            .await
            .expect("connect test pool");
        migrations::run_pending(&pool).await.expect("run migrations");
        pool
    }

    // The shared-cache test database is process-wide, so each test works
    // against its own `tag`-scoped tenant, product and message ids.
    fn pizza(tag: &str, stock: i64) -> Product {
        Product {
            id: ProductId(format!("p-pizza-{tag}")),
            tenant_id: TenantId(format!("tenant-{tag}")),
            name: "Pizza Margherita".to_string(),
            description: None,
            price: Decimal::new(1599, 2),
            sku: None,
            available: true,
            stock: Some(stock),
            min_stock: Some(1),
            track_stock: true,
        }
    }

    fn new_order(tag: &str, quantity: u32) -> NewOrder {
        NewOrder {
            tenant_id: TenantId(format!("tenant-{tag}")),
            customer_phone: "+5215512345678".to_string(),
            customer_name: None,
            lines: vec![OrderLine {
                product_id: ProductId(format!("p-pizza-{tag}")),
                product_name: "Pizza Margherita".to_string(),
                quantity,
                unit_price: Decimal::new(1599, 2),
            }],
            source_message_id: MessageId(format!("msg-{tag}")),
        }
    }

    async fn stock_of(pool: &DbPool, product_id: &str) -> i64 {
        sqlx::query("SELECT stock FROM product WHERE id = ?")
            .bind(product_id)
            .fetch_one(pool)
            .await
            .expect("product row")
            .get::<i64, _>("stock")
    }

    async fn order_count_for_tenant(pool: &DbPool, tenant: &str) -> i64 {
        sqlx::query("SELECT COUNT(*) AS count FROM customer_order WHERE tenant_id = ?")
            .bind(tenant)
            .fetch_one(pool)
            .await
            .expect("count orders")
            .get::<i64, _>("count")
    }

    #[tokio::test]
    async fn commit_snapshots_lines_and_decrements_stock() {
        let pool = setup_pool().await;
        let catalog = SqlCatalogRepository::new(pool.clone());
        catalog.save(pizza("ord-ok", 5)).await.expect("seed product");

        let store = SqlOrderStore::new(pool.clone());
        let outcome = store.commit(new_order("ord-ok", 2)).await.expect("commit");

        let order = match outcome {
            OrderCommitOutcome::Created(order) => order,
            other => panic!("expected created order, got {other:?}"),
        };

        assert_eq!(order.total, Decimal::new(3198, 2));
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(order.totals_consistent());
        assert_eq!(stock_of(&pool, "p-pizza-ord-ok").await, 3);

        let reloaded = store.find_by_id(&order.id).await.expect("find").expect("order exists");
        assert_eq!(reloaded, order);

        pool.close().await;
    }

    #[tokio::test]
    async fn commit_aborts_without_partial_rows_when_stock_is_short() {
        let pool = setup_pool().await;
        let catalog = SqlCatalogRepository::new(pool.clone());
        catalog.save(pizza("ord-short", 2)).await.expect("seed product");

        let store = SqlOrderStore::new(pool.clone());
        let outcome = store.commit(new_order("ord-short", 3)).await.expect("commit");

        assert_eq!(
            outcome,
            OrderCommitOutcome::InsufficientStock {
                product_name: "Pizza Margherita".to_string(),
                available: 2,
            }
        );
        assert_eq!(stock_of(&pool, "p-pizza-ord-short").await, 2);
        assert_eq!(order_count_for_tenant(&pool, "tenant-ord-short").await, 0);

        pool.close().await;
    }

    #[tokio::test]
    async fn commit_aborts_multi_line_order_without_decrementing_earlier_lines() {
        let pool = setup_pool().await;
        let catalog = SqlCatalogRepository::new(pool.clone());
        catalog.save(pizza("ord-multi", 5)).await.expect("seed pizza");
        catalog
            .save(Product {
                id: ProductId("p-soda-ord-multi".to_string()),
                tenant_id: TenantId("tenant-ord-multi".to_string()),
                name: "Refresco 600ml".to_string(),
                description: None,
                price: Decimal::new(350, 2),
                sku: None,
                available: true,
                stock: Some(0),
                min_stock: None,
                track_stock: true,
            })
            .await
            .expect("seed soda");

        let store = SqlOrderStore::new(pool.clone());
        let mut order = new_order("ord-multi", 1);
        order.lines.push(OrderLine {
            product_id: ProductId("p-soda-ord-multi".to_string()),
            product_name: "Refresco 600ml".to_string(),
            quantity: 1,
            unit_price: Decimal::new(350, 2),
        });

        let outcome = store.commit(order).await.expect("commit");
        assert!(matches!(outcome, OrderCommitOutcome::InsufficientStock { ref product_name, .. }
            if product_name == "Refresco 600ml"));

        // The pizza decrement from the first line must have rolled back.
        assert_eq!(stock_of(&pool, "p-pizza-ord-multi").await, 5);

        pool.close().await;
    }

    #[tokio::test]
    async fn commit_is_idempotent_on_source_message_id() {
        let pool = setup_pool().await;
        let catalog = SqlCatalogRepository::new(pool.clone());
        catalog.save(pizza("ord-dedup", 5)).await.expect("seed product");

        let store = SqlOrderStore::new(pool.clone());
        let first = store.commit(new_order("ord-dedup", 2)).await.expect("first commit");
        let first_id = match first {
            OrderCommitOutcome::Created(order) => order.id,
            other => panic!("expected created order, got {other:?}"),
        };

        let second = store.commit(new_order("ord-dedup", 2)).await.expect("second commit");
        assert_eq!(second, OrderCommitOutcome::DuplicateSource { existing: first_id.clone() });

        // No second decrement either.
        assert_eq!(stock_of(&pool, "p-pizza-ord-dedup").await, 3);

        let by_source = store
            .find_by_source_message(&MessageId("msg-ord-dedup".to_string()))
            .await
            .expect("find by source")
            .expect("order exists");
        assert_eq!(by_source.id, first_id);

        pool.close().await;
    }

    #[tokio::test]
    async fn commit_snapshots_the_price_at_commit_time() {
        let pool = setup_pool().await;
        let catalog = SqlCatalogRepository::new(pool.clone());

        // The catalog price rose after validation built the 15.99 lines.
        let mut repriced = pizza("ord-reprice", 5);
        repriced.price = Decimal::new(1799, 2);
        catalog.save(repriced).await.expect("seed product");

        let store = SqlOrderStore::new(pool.clone());
        let outcome = store.commit(new_order("ord-reprice", 2)).await.expect("commit");

        let order = match outcome {
            OrderCommitOutcome::Created(order) => order,
            other => panic!("expected created order, got {other:?}"),
        };
        assert_eq!(order.lines[0].unit_price, Decimal::new(1799, 2));
        assert_eq!(order.total, Decimal::new(3598, 2));
        assert!(order.totals_consistent());

        pool.close().await;
    }

    #[tokio::test]
    async fn commit_reports_missing_product_without_writing() {
        let pool = setup_pool().await;
        let store = SqlOrderStore::new(pool.clone());

        let outcome = store.commit(new_order("ord-missing", 1)).await.expect("commit");
        assert_eq!(
            outcome,
            OrderCommitOutcome::ProductMissing { product_name: "Pizza Margherita".to_string() }
        );
        assert_eq!(order_count_for_tenant(&pool, "tenant-ord-missing").await, 0);

        pool.close().await;
    }
}
