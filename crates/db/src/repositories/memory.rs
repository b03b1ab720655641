//! In-memory implementations of every repository trait, backed by one shared
//! state so order commits observe the same products the catalog serves. Used
//! by pipeline tests and local experiments; semantics mirror the Sql
//! implementations, including dedup and all-or-nothing stock decrements.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use pedibot_core::domain::message::{ChatMessage, MessageId};
use pedibot_core::domain::order::{NewOrder, Order, OrderId, OrderStatus};
use pedibot_core::domain::product::{Product, ProductId, TenantId};

use super::queue::retry_delay;
use super::{
    CatalogRepository, JobId, JobQueue, JobState, MessageJob, MessageStore, OrderCommitOutcome,
    OrderStore, RepositoryError,
};

#[derive(Default)]
struct State {
    products: HashMap<String, Product>,
    orders: HashMap<String, Order>,
    messages: Vec<ChatMessage>,
    jobs: HashMap<String, MessageJob>,
}

#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed_products(&self, products: Vec<Product>) {
        let mut state = self.state.write().await;
        for product in products {
            state.products.insert(product.id.0.clone(), product);
        }
    }

    pub async fn stock_of(&self, id: &ProductId) -> Option<i64> {
        let state = self.state.read().await;
        state.products.get(&id.0).and_then(|product| product.stock)
    }

    pub async fn order_count(&self) -> usize {
        let state = self.state.read().await;
        state.orders.len()
    }
}

#[async_trait::async_trait]
impl CatalogRepository for InMemoryStore {
    async fn list_for_tenant(&self, tenant_id: &TenantId) -> Result<Vec<Product>, RepositoryError> {
        let state = self.state.read().await;
        let mut products: Vec<Product> = state
            .products
            .values()
            .filter(|product| &product.tenant_id == tenant_id)
            .cloned()
            .collect();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(products)
    }

    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.products.get(&id.0).cloned())
    }

    async fn save(&self, product: Product) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        state.products.insert(product.id.0.clone(), product);
        Ok(())
    }
}

#[async_trait::async_trait]
impl OrderStore for InMemoryStore {
    async fn commit(&self, order: NewOrder) -> Result<OrderCommitOutcome, RepositoryError> {
        let mut state = self.state.write().await;

        if let Some(existing) = state
            .orders
            .values()
            .find(|candidate| candidate.source_message_id == order.source_message_id)
        {
            return Ok(OrderCommitOutcome::DuplicateSource { existing: existing.id.clone() });
        }

        // Check every line before touching stock so a late failure cannot
        // leave earlier decrements behind.
        for line in &order.lines {
            let Some(product) = state.products.get(&line.product_id.0) else {
                return Ok(OrderCommitOutcome::ProductMissing {
                    product_name: line.product_name.clone(),
                });
            };
            if product.tenant_id != order.tenant_id {
                return Ok(OrderCommitOutcome::ProductMissing {
                    product_name: line.product_name.clone(),
                });
            }
            if !product.available {
                return Ok(OrderCommitOutcome::InsufficientStock {
                    product_name: line.product_name.clone(),
                    available: 0,
                });
            }
            if product.track_stock {
                let stock = product.stock.unwrap_or(0);
                if stock < i64::from(line.quantity) {
                    return Ok(OrderCommitOutcome::InsufficientStock {
                        product_name: line.product_name.clone(),
                        available: stock,
                    });
                }
            }
        }

        // Snapshot prices from the catalog as seen at commit time, and apply
        // the decrements.
        let mut lines = order.lines;
        for line in &mut lines {
            if let Some(product) = state.products.get_mut(&line.product_id.0) {
                line.unit_price = product.price;
                if product.track_stock {
                    product.stock =
                        Some(product.stock.unwrap_or(0) - i64::from(line.quantity));
                }
            }
        }

        let committed = Order {
            id: OrderId(Uuid::new_v4().to_string()),
            tenant_id: order.tenant_id,
            customer_phone: order.customer_phone,
            customer_name: order.customer_name,
            total: lines.iter().map(|line| line.line_total()).sum(),
            lines,
            status: OrderStatus::Pending,
            source_message_id: order.source_message_id,
            created_at: Utc::now(),
        };
        state.orders.insert(committed.id.0.clone(), committed.clone());

        Ok(OrderCommitOutcome::Created(committed))
    }

    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.orders.get(&id.0).cloned())
    }

    async fn find_by_source_message(
        &self,
        message_id: &MessageId,
    ) -> Result<Option<Order>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .values()
            .find(|order| &order.source_message_id == message_id)
            .cloned())
    }
}

#[async_trait::async_trait]
impl MessageStore for InMemoryStore {
    async fn append(&self, message: ChatMessage) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        state.messages.push(message);
        Ok(())
    }

    async fn history(
        &self,
        tenant_id: &TenantId,
        customer_phone: &str,
        limit: u32,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        let state = self.state.read().await;
        let mut messages: Vec<ChatMessage> = state
            .messages
            .iter()
            .filter(|message| {
                &message.tenant_id == tenant_id && message.customer_phone == customer_phone
            })
            .cloned()
            .collect();
        messages.sort_by_key(|message| message.received_at);
        let skip = messages.len().saturating_sub(limit as usize);
        Ok(messages.split_off(skip))
    }

    async fn attach_nlp_metadata(
        &self,
        message_id: &MessageId,
        metadata: serde_json::Value,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        if let Some(message) = state.messages.iter_mut().find(|message| &message.id == message_id)
        {
            message.nlp_metadata = Some(metadata);
        }
        Ok(())
    }

    async fn link_order(
        &self,
        message_id: &MessageId,
        order_id: &OrderId,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        if let Some(message) = state.messages.iter_mut().find(|message| &message.id == message_id)
        {
            message.order_id = Some(order_id.clone());
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl JobQueue for InMemoryStore {
    async fn enqueue(&self, job: MessageJob) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        let already_queued =
            state.jobs.values().any(|existing| existing.message_id == job.message_id);
        if !already_queued {
            state.jobs.insert(job.id.0.clone(), job);
        }
        Ok(())
    }

    async fn claim_next(&self, worker_id: &str) -> Result<Option<MessageJob>, RepositoryError> {
        let mut state = self.state.write().await;
        let now = Utc::now();

        let candidate_id = state
            .jobs
            .values()
            .filter(|job| job.state == JobState::Queued && job.available_at <= now)
            .min_by_key(|job| (job.available_at, job.created_at))
            .map(|job| job.id.0.clone());

        let Some(candidate_id) = candidate_id else {
            return Ok(None);
        };

        let Some(job) = state.jobs.get_mut(&candidate_id) else {
            return Ok(None);
        };
        job.state = JobState::Running;
        job.claimed_by = Some(worker_id.to_string());
        job.claimed_at = Some(now);
        job.updated_at = now;
        Ok(Some(job.clone()))
    }

    async fn complete(&self, job_id: &JobId) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        if let Some(job) = state.jobs.get_mut(&job_id.0) {
            if job.state == JobState::Running {
                job.state = JobState::Done;
                job.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn fail(&self, job_id: &JobId, error: &str) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        if let Some(job) = state.jobs.get_mut(&job_id.0) {
            if job.state != JobState::Running {
                return Ok(());
            }
            let now = Utc::now();
            job.attempts += 1;
            job.last_error = Some(error.to_string());
            job.updated_at = now;
            if job.attempts < job.max_attempts {
                job.state = JobState::Queued;
                job.available_at = now + retry_delay(job.attempts);
                job.claimed_by = None;
                job.claimed_at = None;
            } else {
                job.state = JobState::Dead;
            }
        }
        Ok(())
    }

    async fn requeue_stale(
        &self,
        lease: chrono::Duration,
    ) -> Result<u64, RepositoryError> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let cutoff = now - lease;
        let mut requeued = 0;

        for job in state.jobs.values_mut() {
            let expired = job.state == JobState::Running
                && job.claimed_at.map(|claimed| claimed <= cutoff).unwrap_or(false);
            if expired {
                job.state = JobState::Queued;
                job.claimed_by = None;
                job.claimed_at = None;
                job.available_at = now;
                job.updated_at = now;
                requeued += 1;
            }
        }

        Ok(requeued)
    }
}
