use chrono::{Duration, Utc};
use sqlx::{sqlite::SqliteRow, Row};

use pedibot_core::domain::message::MessageId;
use pedibot_core::domain::product::TenantId;

use super::{
    parse_optional_timestamp, parse_timestamp, parse_u32, JobId, JobQueue, JobState, MessageJob,
    RepositoryError,
};
use crate::DbPool;

/// Base delay for redelivery backoff; attempt N waits `BASE << N` seconds.
const RETRY_BASE_DELAY_SECS: i64 = 5;
const RETRY_MAX_DELAY_SECS: i64 = 300;

pub struct SqlJobQueue {
    pool: DbPool,
}

impl SqlJobQueue {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn retry_delay(attempts: u32) -> Duration {
    let exponent = attempts.min(16);
    let delay_secs = RETRY_BASE_DELAY_SECS
        .saturating_mul(1_i64 << exponent)
        .min(RETRY_MAX_DELAY_SECS);
    Duration::seconds(delay_secs)
}

#[async_trait::async_trait]
impl JobQueue for SqlJobQueue {
    async fn enqueue(&self, job: MessageJob) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO message_job (
                id,
                tenant_id,
                message_id,
                customer_phone,
                customer_name,
                body,
                media_ref,
                state,
                attempts,
                max_attempts,
                available_at,
                claimed_by,
                claimed_at,
                last_error,
                created_at,
                updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(message_id) DO NOTHING",
        )
        .bind(&job.id.0)
        .bind(&job.tenant_id.0)
        .bind(&job.message_id.0)
        .bind(&job.customer_phone)
        .bind(job.customer_name.as_deref())
        .bind(&job.text)
        .bind(job.media_ref.as_deref())
        .bind(job.state.as_str())
        .bind(i64::from(job.attempts))
        .bind(i64::from(job.max_attempts))
        .bind(job.available_at.to_rfc3339())
        .bind(job.claimed_by.as_deref())
        .bind(job.claimed_at.map(|value| value.to_rfc3339()))
        .bind(job.last_error.as_deref())
        .bind(job.created_at.to_rfc3339())
        .bind(job.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn claim_next(&self, worker_id: &str) -> Result<Option<MessageJob>, RepositoryError> {
        let now = Utc::now();

        let candidate = sqlx::query(
            "SELECT id FROM message_job
             WHERE state = 'queued' AND available_at <= ?
             ORDER BY available_at ASC, created_at ASC
             LIMIT 1",
        )
        .bind(now.to_rfc3339())
        .fetch_optional(&self.pool)
        .await?;

        let Some(candidate) = candidate else {
            return Ok(None);
        };
        let job_id: String = candidate.try_get("id")?;

        // Conditional claim; if another worker got here first the state is no
        // longer `queued` and this update touches nothing.
        let claimed = sqlx::query(
            "UPDATE message_job
             SET state = 'running', claimed_by = ?, claimed_at = ?, updated_at = ?
             WHERE id = ? AND state = 'queued'",
        )
        .bind(worker_id)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .bind(&job_id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if claimed == 0 {
            return Ok(None);
        }

        let row = sqlx::query(
            "SELECT
                id,
                tenant_id,
                message_id,
                customer_phone,
                customer_name,
                body,
                media_ref,
                state,
                attempts,
                max_attempts,
                available_at,
                claimed_by,
                claimed_at,
                last_error,
                created_at,
                updated_at
             FROM message_job
             WHERE id = ?",
        )
        .bind(&job_id)
        .fetch_one(&self.pool)
        .await?;

        job_from_row(row).map(Some)
    }

    async fn complete(&self, job_id: &JobId) -> Result<(), RepositoryError> {
        sqlx::query(
            "UPDATE message_job
             SET state = 'done', updated_at = ?
             WHERE id = ? AND state = 'running'",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(&job_id.0)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn fail(&self, job_id: &JobId, error: &str) -> Result<(), RepositoryError> {
        let row = sqlx::query("SELECT attempts, max_attempts FROM message_job WHERE id = ?")
            .bind(&job_id.0)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(());
        };

        let attempts = parse_u32("attempts", row.try_get("attempts")?)? + 1;
        let max_attempts = parse_u32("max_attempts", row.try_get("max_attempts")?)?;
        let now = Utc::now();

        if attempts < max_attempts {
            let available_at = now + retry_delay(attempts);
            sqlx::query(
                "UPDATE message_job
                 SET state = 'queued', attempts = ?, available_at = ?, claimed_by = NULL,
                     claimed_at = NULL, last_error = ?, updated_at = ?
                 WHERE id = ? AND state = 'running'",
            )
            .bind(i64::from(attempts))
            .bind(available_at.to_rfc3339())
            .bind(error)
            .bind(now.to_rfc3339())
            .bind(&job_id.0)
            .execute(&self.pool)
            .await?;
        } else {
            sqlx::query(
                "UPDATE message_job
                 SET state = 'dead', attempts = ?, last_error = ?, updated_at = ?
                 WHERE id = ? AND state = 'running'",
            )
            .bind(i64::from(attempts))
            .bind(error)
            .bind(now.to_rfc3339())
            .bind(&job_id.0)
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }

    async fn requeue_stale(&self, lease: Duration) -> Result<u64, RepositoryError> {
        let now = Utc::now();
        let cutoff = now - lease;

        let requeued = sqlx::query(
            "UPDATE message_job
             SET state = 'queued', claimed_by = NULL, claimed_at = NULL,
                 available_at = ?, updated_at = ?
             WHERE state = 'running' AND claimed_at <= ?",
        )
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .bind(cutoff.to_rfc3339())
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(requeued)
    }
}

fn job_from_row(row: SqliteRow) -> Result<MessageJob, RepositoryError> {
    let state_raw: String = row.try_get("state")?;
    let state = JobState::parse(&state_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown job state `{state_raw}`")))?;

    Ok(MessageJob {
        id: JobId(row.try_get("id")?),
        tenant_id: TenantId(row.try_get("tenant_id")?),
        message_id: MessageId(row.try_get("message_id")?),
        customer_phone: row.try_get("customer_phone")?,
        customer_name: row.try_get("customer_name")?,
        text: row.try_get("body")?,
        media_ref: row.try_get("media_ref")?,
        state,
        attempts: parse_u32("attempts", row.try_get("attempts")?)?,
        max_attempts: parse_u32("max_attempts", row.try_get("max_attempts")?)?,
        available_at: parse_timestamp("available_at", row.try_get("available_at")?)?,
        claimed_by: row.try_get("claimed_by")?,
        claimed_at: parse_optional_timestamp("claimed_at", row.try_get("claimed_at")?)?,
        last_error: row.try_get("last_error")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
    })
}
