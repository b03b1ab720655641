use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use pedibot_core::domain::message::{ChatMessage, MessageId};
use pedibot_core::domain::order::{NewOrder, Order, OrderId};
use pedibot_core::domain::product::{Product, ProductId, TenantId};

pub mod catalog;
pub mod memory;
pub mod message;
pub mod order;
pub mod queue;

pub use catalog::SqlCatalogRepository;
pub use memory::InMemoryStore;
pub use message::SqlMessageStore;
pub use order::SqlOrderStore;
pub use queue::SqlJobQueue;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Read/write access to a tenant's product records.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// The tenant's full catalog in stable name order, including unavailable
    /// products (the prompt marks their state; matching filters them).
    async fn list_for_tenant(&self, tenant_id: &TenantId) -> Result<Vec<Product>, RepositoryError>;
    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError>;
    async fn save(&self, product: Product) -> Result<(), RepositoryError>;
}

/// How an atomic order commit ended. Only `Created` leaves new rows behind;
/// every other outcome rolls the whole attempt back.
#[derive(Clone, Debug, PartialEq)]
pub enum OrderCommitOutcome {
    Created(Order),
    DuplicateSource { existing: OrderId },
    InsufficientStock { product_name: String, available: i64 },
    ProductMissing { product_name: String },
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Commits an order in one transaction: dedup check on the source
    /// message, conditional stock decrement per tracked line, then the order
    /// and line inserts. Stock can never go negative through this path.
    async fn commit(&self, order: NewOrder) -> Result<OrderCommitOutcome, RepositoryError>;
    async fn find_by_id(&self, id: &OrderId) -> Result<Option<Order>, RepositoryError>;
    async fn find_by_source_message(
        &self,
        message_id: &MessageId,
    ) -> Result<Option<Order>, RepositoryError>;
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn append(&self, message: ChatMessage) -> Result<(), RepositoryError>;
    /// Oldest-first conversation window for one customer.
    async fn history(
        &self,
        tenant_id: &TenantId,
        customer_phone: &str,
        limit: u32,
    ) -> Result<Vec<ChatMessage>, RepositoryError>;
    async fn attach_nlp_metadata(
        &self,
        message_id: &MessageId,
        metadata: serde_json::Value,
    ) -> Result<(), RepositoryError>;
    async fn link_order(
        &self,
        message_id: &MessageId,
        order_id: &OrderId,
    ) -> Result<(), RepositoryError>;
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Queued,
    Running,
    Done,
    Dead,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Done => "done",
            Self::Dead => "dead",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "queued" => Some(Self::Queued),
            "running" => Some(Self::Running),
            "done" => Some(Self::Done),
            "dead" => Some(Self::Dead),
            _ => None,
        }
    }
}

/// One inbound message awaiting (or undergoing) pipeline processing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageJob {
    pub id: JobId,
    pub tenant_id: TenantId,
    pub message_id: MessageId,
    pub customer_phone: String,
    pub customer_name: Option<String>,
    pub text: String,
    pub media_ref: Option<String>,
    pub state: JobState,
    pub attempts: u32,
    pub max_attempts: u32,
    pub available_at: DateTime<Utc>,
    pub claimed_by: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Durable at-least-once work queue. Claiming is a conditional state flip so
/// two workers can never hold the same job; a worker crash before `complete`
/// leaves the job claimable again once its attempt is failed or reaped.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Idempotent on the message id: enqueuing the same inbound message twice
    /// keeps a single job.
    async fn enqueue(&self, job: MessageJob) -> Result<(), RepositoryError>;
    async fn claim_next(&self, worker_id: &str) -> Result<Option<MessageJob>, RepositoryError>;
    async fn complete(&self, job_id: &JobId) -> Result<(), RepositoryError>;
    /// Re-queues with exponential backoff until `max_attempts`, then parks
    /// the job dead.
    async fn fail(&self, job_id: &JobId, error: &str) -> Result<(), RepositoryError>;
    /// Returns running jobs whose claim is older than `lease` to the queue.
    /// A worker that crashed mid-job never acked; this is what makes its job
    /// deliverable again.
    async fn requeue_stale(&self, lease: chrono::Duration) -> Result<u64, RepositoryError>;
}

pub(crate) fn parse_u32(column: &str, value: i64) -> Result<u32, RepositoryError> {
    u32::try_from(value).map_err(|_| {
        RepositoryError::Decode(format!(
            "invalid value for `{column}` (expected non-negative u32): {value}"
        ))
    })
}

pub(crate) fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}

pub(crate) fn parse_optional_timestamp(
    column: &str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    value.map(|timestamp| parse_timestamp(column, timestamp)).transpose()
}

pub(crate) fn parse_decimal(
    column: &str,
    value: String,
) -> Result<rust_decimal::Decimal, RepositoryError> {
    value.parse().map_err(|error| {
        RepositoryError::Decode(format!("invalid decimal in `{column}`: `{value}` ({error})"))
    })
}
