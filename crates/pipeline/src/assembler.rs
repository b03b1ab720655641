//! Order Assembler: turns a validated extraction into snapshot order lines
//! and delegates the atomic commit to the store. Preconditions are contract,
//! not input validation; violating them means the orchestrator routed wrong.

use std::sync::Arc;

use thiserror::Error;

use pedibot_core::domain::extraction::{ExtractionResult, Intent};
use pedibot_core::errors::DomainError;
use pedibot_core::domain::message::MessageId;
use pedibot_core::domain::order::{NewOrder, Order, OrderLine};
use pedibot_core::domain::product::TenantId;
use pedibot_core::replies::{UnavailableItem, UnavailableReason};
use pedibot_db::repositories::{OrderCommitOutcome, OrderStore, RepositoryError};

#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Store(#[from] RepositoryError),
}

#[derive(Clone, Debug, PartialEq)]
pub enum AssembleOutcome {
    Created(Order),
    /// The source message already produced an order (queue redelivery).
    AlreadyPlaced(Order),
    /// Commit-time stock race or catalog inconsistency; recoverable as a
    /// partial-order reply, nothing was persisted.
    Unavailable(Vec<UnavailableItem>),
}

pub struct OrderAssembler {
    orders: Arc<dyn OrderStore>,
}

impl OrderAssembler {
    pub fn new(orders: Arc<dyn OrderStore>) -> Self {
        Self { orders }
    }

    pub async fn assemble(
        &self,
        tenant_id: &TenantId,
        customer_phone: &str,
        customer_name: Option<&str>,
        source_message_id: &MessageId,
        result: &ExtractionResult,
    ) -> Result<AssembleOutcome, AssemblyError> {
        if result.intent != Intent::Order {
            return Err(DomainError::InvariantViolation(format!(
                "assembler invoked with intent `{}`",
                result.intent.as_str()
            ))
            .into());
        }
        if result.entities.products.is_empty() {
            return Err(DomainError::InvariantViolation(
                "assembler invoked with no resolved products".to_string(),
            )
            .into());
        }
        if result.has_insufficient_stock() {
            return Err(DomainError::InvariantViolation(
                "assembler invoked with insufficient-stock entities".to_string(),
            )
            .into());
        }

        // Dedup before assembly; the store's unique constraint is the
        // backstop for the race between this read and the commit.
        if let Some(existing) = self.orders.find_by_source_message(source_message_id).await? {
            return Ok(AssembleOutcome::AlreadyPlaced(existing));
        }

        let lines: Vec<OrderLine> = result
            .entities
            .products
            .iter()
            .map(|resolved| OrderLine {
                product_id: resolved.product_id.clone(),
                product_name: resolved.matched_name.clone(),
                quantity: resolved.quantity,
                unit_price: resolved.unit_price,
            })
            .collect();

        let new_order = NewOrder {
            tenant_id: tenant_id.clone(),
            customer_phone: customer_phone.to_string(),
            customer_name: customer_name.map(|name| name.to_string()),
            lines,
            source_message_id: source_message_id.clone(),
        };

        match self.orders.commit(new_order).await? {
            OrderCommitOutcome::Created(order) => Ok(AssembleOutcome::Created(order)),
            OrderCommitOutcome::DuplicateSource { existing } => {
                let order = self.orders.find_by_id(&existing).await?.ok_or_else(|| {
                    DomainError::InvariantViolation(format!(
                        "dedup pointed at order `{}` which does not exist",
                        existing.0
                    ))
                })?;
                Ok(AssembleOutcome::AlreadyPlaced(order))
            }
            OrderCommitOutcome::InsufficientStock { product_name, available } => {
                let requested = requested_quantity(result, &product_name);
                Ok(AssembleOutcome::Unavailable(vec![UnavailableItem {
                    name: product_name,
                    requested,
                    reason: UnavailableReason::InsufficientStock { available },
                }]))
            }
            OrderCommitOutcome::ProductMissing { product_name } => {
                // Validated moments ago and now gone: a catalog edit raced
                // the commit. Surfaced to the customer as unavailable.
                tracing::warn!(
                    event_name = "pipeline.catalog_inconsistency",
                    tenant_id = %tenant_id.0,
                    product_name = %product_name,
                    "validated product disappeared before commit"
                );
                let requested = requested_quantity(result, &product_name);
                Ok(AssembleOutcome::Unavailable(vec![UnavailableItem {
                    name: product_name,
                    requested,
                    reason: UnavailableReason::NotFound,
                }]))
            }
        }
    }
}

fn requested_quantity(result: &ExtractionResult, product_name: &str) -> u32 {
    result
        .entities
        .products
        .iter()
        .find(|resolved| resolved.matched_name == product_name)
        .map(|resolved| resolved.quantity)
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rust_decimal::Decimal;

    use pedibot_core::domain::extraction::{ExtractionResult, Intent, ResolvedProduct};
    use pedibot_core::domain::message::MessageId;
    use pedibot_core::domain::product::{Product, ProductId, TenantId};
    use pedibot_core::replies::UnavailableReason;
    use pedibot_db::repositories::InMemoryStore;

    use super::{AssembleOutcome, AssemblyError, OrderAssembler};

    fn pizza(stock: i64) -> Product {
        Product {
            id: ProductId("p-pizza".to_string()),
            tenant_id: TenantId("tenant-1".to_string()),
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

    fn order_result(quantity: u32) -> ExtractionResult {
        let mut result = ExtractionResult::fallback();
        result.parse_failed = false;
        result.intent = Intent::Order;
        result.confidence = 0.9;
        result.entities.products.push(ResolvedProduct {
            requested_name: "pizza margherita".to_string(),
            matched_name: "Pizza Margherita".to_string(),
            product_id: ProductId("p-pizza".to_string()),
            quantity,
            unit_price: Decimal::new(1599, 2),
            stock_available: Some(5),
            insufficient_stock: false,
            original_request_text: "pizza margherita".to_string(),
        });
        result.recompute_total();
        result
    }

    fn assembler(store: &InMemoryStore) -> OrderAssembler {
        OrderAssembler::new(Arc::new(store.clone()))
    }

    #[tokio::test]
    async fn assembles_order_with_snapshot_total() {
        let store = InMemoryStore::new();
        store.seed_products(vec![pizza(5)]).await;

        let outcome = assembler(&store)
            .assemble(
                &TenantId("tenant-1".to_string()),
                "+5215512345678",
                Some("Ana"),
                &MessageId("msg-1".to_string()),
                &order_result(2),
            )
            .await
            .expect("assemble");

        let order = match outcome {
            AssembleOutcome::Created(order) => order,
            other => panic!("expected created, got {other:?}"),
        };
        assert_eq!(order.total, Decimal::new(3198, 2));
        assert!(order.totals_consistent());
        assert_eq!(store.stock_of(&ProductId("p-pizza".to_string())).await, Some(3));
    }

    #[tokio::test]
    async fn redelivered_message_returns_the_existing_order() {
        let store = InMemoryStore::new();
        store.seed_products(vec![pizza(5)]).await;
        let assembler = assembler(&store);

        let first = assembler
            .assemble(
                &TenantId("tenant-1".to_string()),
                "+5215512345678",
                Some("Ana"),
                &MessageId("msg-1".to_string()),
                &order_result(2),
            )
            .await
            .expect("first assemble");
        let first_id = match first {
            AssembleOutcome::Created(order) => order.id,
            other => panic!("expected created, got {other:?}"),
        };

        let second = assembler
            .assemble(
                &TenantId("tenant-1".to_string()),
                "+5215512345678",
                Some("Ana"),
                &MessageId("msg-1".to_string()),
                &order_result(2),
            )
            .await
            .expect("second assemble");

        match second {
            AssembleOutcome::AlreadyPlaced(order) => assert_eq!(order.id, first_id),
            other => panic!("expected already placed, got {other:?}"),
        }
        assert_eq!(store.order_count().await, 1);
    }

    #[tokio::test]
    async fn commit_time_stock_race_degrades_to_unavailable() {
        let store = InMemoryStore::new();
        // Validation saw 5 units, but by commit time only 1 is left.
        store.seed_products(vec![pizza(1)]).await;

        let outcome = assembler(&store)
            .assemble(
                &TenantId("tenant-1".to_string()),
                "+5215512345678",
                Some("Ana"),
                &MessageId("msg-1".to_string()),
                &order_result(2),
            )
            .await
            .expect("assemble");

        match outcome {
            AssembleOutcome::Unavailable(items) => {
                assert_eq!(items.len(), 1);
                assert_eq!(items[0].requested, 2);
                assert_eq!(
                    items[0].reason,
                    UnavailableReason::InsufficientStock { available: 1 }
                );
            }
            other => panic!("expected unavailable, got {other:?}"),
        }
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn deleted_product_surfaces_as_not_found() {
        let store = InMemoryStore::new();

        let outcome = assembler(&store)
            .assemble(
                &TenantId("tenant-1".to_string()),
                "+5215512345678",
                Some("Ana"),
                &MessageId("msg-1".to_string()),
                &order_result(1),
            )
            .await
            .expect("assemble");

        match outcome {
            AssembleOutcome::Unavailable(items) => {
                assert_eq!(items[0].reason, UnavailableReason::NotFound);
            }
            other => panic!("expected unavailable, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn wrong_intent_is_a_contract_violation() {
        let store = InMemoryStore::new();
        let mut result = order_result(1);
        result.intent = Intent::Greeting;

        let error = assembler(&store)
            .assemble(
                &TenantId("tenant-1".to_string()),
                "+5215512345678",
                Some("Ana"),
                &MessageId("msg-1".to_string()),
                &result,
            )
            .await
            .expect_err("should violate contract");

        assert!(matches!(error, AssemblyError::Domain(_)));
    }

    #[tokio::test]
    async fn insufficient_stock_entities_are_a_contract_violation() {
        let store = InMemoryStore::new();
        let mut result = order_result(3);
        result.entities.products[0].insufficient_stock = true;

        let error = assembler(&store)
            .assemble(
                &TenantId("tenant-1".to_string()),
                "+5215512345678",
                Some("Ana"),
                &MessageId("msg-1".to_string()),
                &result,
            )
            .await
            .expect_err("should violate contract");

        assert!(matches!(error, AssemblyError::Domain(_)));
    }
}
