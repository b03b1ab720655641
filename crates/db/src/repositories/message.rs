use sqlx::{sqlite::SqliteRow, Row};

use pedibot_core::domain::message::{ChatMessage, MessageDirection, MessageId};
use pedibot_core::domain::order::OrderId;
use pedibot_core::domain::product::TenantId;

use super::{parse_timestamp, MessageStore, RepositoryError};
use crate::DbPool;

pub struct SqlMessageStore {
    pool: DbPool,
}

impl SqlMessageStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl MessageStore for SqlMessageStore {
    async fn append(&self, message: ChatMessage) -> Result<(), RepositoryError> {
        let metadata = message
            .nlp_metadata
            .as_ref()
            .map(|value| serde_json::to_string(value))
            .transpose()
            .map_err(|error| {
                RepositoryError::Decode(format!("unserializable nlp metadata: {error}"))
            })?;

        sqlx::query(
            "INSERT INTO chat_message (
                id,
                tenant_id,
                customer_phone,
                body,
                direction,
                received_at,
                order_id,
                nlp_metadata
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&message.id.0)
        .bind(&message.tenant_id.0)
        .bind(&message.customer_phone)
        .bind(&message.text)
        .bind(message.direction.as_str())
        .bind(message.received_at.to_rfc3339())
        .bind(message.order_id.as_ref().map(|id| id.0.as_str()))
        .bind(metadata.as_deref())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn history(
        &self,
        tenant_id: &TenantId,
        customer_phone: &str,
        limit: u32,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT
                id,
                tenant_id,
                customer_phone,
                body,
                direction,
                received_at,
                order_id,
                nlp_metadata
             FROM chat_message
             WHERE tenant_id = ? AND customer_phone = ?
             ORDER BY received_at DESC, rowid DESC
             LIMIT ?",
        )
        .bind(&tenant_id.0)
        .bind(customer_phone)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        let mut messages = rows
            .into_iter()
            .map(message_from_row)
            .collect::<Result<Vec<_>, RepositoryError>>()?;
        messages.reverse();
        Ok(messages)
    }

    async fn attach_nlp_metadata(
        &self,
        message_id: &MessageId,
        metadata: serde_json::Value,
    ) -> Result<(), RepositoryError> {
        let serialized = serde_json::to_string(&metadata).map_err(|error| {
            RepositoryError::Decode(format!("unserializable nlp metadata: {error}"))
        })?;

        sqlx::query("UPDATE chat_message SET nlp_metadata = ? WHERE id = ?")
            .bind(&serialized)
            .bind(&message_id.0)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn link_order(
        &self,
        message_id: &MessageId,
        order_id: &OrderId,
    ) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE chat_message SET order_id = ? WHERE id = ?")
            .bind(&order_id.0)
            .bind(&message_id.0)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

fn message_from_row(row: SqliteRow) -> Result<ChatMessage, RepositoryError> {
    let direction_raw: String = row.try_get("direction")?;
    let direction = MessageDirection::parse(&direction_raw).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown message direction `{direction_raw}`"))
    })?;

    let metadata = row
        .try_get::<Option<String>, _>("nlp_metadata")?
        .map(|raw| {
            serde_json::from_str(&raw).map_err(|error| {
                RepositoryError::Decode(format!("invalid nlp metadata json: {error}"))
            })
        })
        .transpose()?;

    Ok(ChatMessage {
        id: MessageId(row.try_get("id")?),
        tenant_id: TenantId(row.try_get("tenant_id")?),
        customer_phone: row.try_get("customer_phone")?,
        text: row.try_get("body")?,
        direction,
        received_at: parse_timestamp("received_at", row.try_get("received_at")?)?,
        order_id: row.try_get::<Option<String>, _>("order_id")?.map(OrderId),
        nlp_metadata: metadata,
    })
}
