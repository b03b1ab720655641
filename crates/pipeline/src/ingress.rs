//! RECEIVED → QUEUED: persists the inbound message as a conversation turn
//! and enqueues its processing job. The webhook controller calls this right
//! after mapping the provider payload; everything downstream is the workers'
//! business.

use chrono::Utc;
use uuid::Uuid;

use pedibot_channel::InboundMessage;
use pedibot_core::domain::message::{ChatMessage, MessageDirection, MessageId};
use pedibot_db::repositories::{
    JobId, JobQueue, JobState, MessageJob, MessageStore, RepositoryError,
};

pub async fn ingest(
    messages: &dyn MessageStore,
    queue: &dyn JobQueue,
    inbound: InboundMessage,
    max_attempts: u32,
) -> Result<MessageJob, RepositoryError> {
    let now = Utc::now();
    let message_id = MessageId(Uuid::new_v4().to_string());

    messages
        .append(ChatMessage {
            id: message_id.clone(),
            tenant_id: inbound.tenant_id.clone(),
            customer_phone: inbound.customer_phone.clone(),
            text: inbound.text.clone(),
            direction: MessageDirection::Inbound,
            received_at: now,
            order_id: None,
            nlp_metadata: None,
        })
        .await?;

    let job = MessageJob {
        id: JobId(Uuid::new_v4().to_string()),
        tenant_id: inbound.tenant_id,
        message_id,
        customer_phone: inbound.customer_phone,
        customer_name: inbound.customer_name,
        text: inbound.text,
        media_ref: inbound.media_ref,
        state: JobState::Queued,
        attempts: 0,
        max_attempts,
        available_at: now,
        claimed_by: None,
        claimed_at: None,
        last_error: None,
        created_at: now,
        updated_at: now,
    };
    queue.enqueue(job.clone()).await?;

    Ok(job)
}
