use crate::traits::{Delivery, LeaseToken, QueueConfig, QueueError, QueueResult, WorkQueue};
use async_trait::async_trait;
use mediaduct_core::WorkMessage;
use sqlx::{PgPool, Row};
use std::time::Duration;
use uuid::Uuid;

/// How often an empty receive re-polls the table while waiting.
const CLAIM_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// PostgreSQL-backed work queue.
///
/// Claims take the oldest visible row with `FOR UPDATE SKIP LOCKED`, bump
/// its receive count, and push `visible_at` past the visibility timeout.
/// Expired leases need no reaper: the row simply becomes claimable again
/// once `visible_at` passes, and a stale lease token no longer matches.
#[derive(Clone)]
pub struct PgWorkQueue {
    pool: PgPool,
    config: QueueConfig,
}

impl PgWorkQueue {
    pub fn new(pool: PgPool, config: QueueConfig) -> Self {
        Self { pool, config }
    }

    async fn try_claim(&self) -> QueueResult<Option<Delivery>> {
        loop {
            let token = Uuid::new_v4();
            let row = sqlx::query(
                r#"
                WITH candidate AS (
                    SELECT id
                    FROM work_messages
                    WHERE dead = FALSE AND visible_at <= NOW()
                    ORDER BY id
                    LIMIT 1
                    FOR UPDATE SKIP LOCKED
                )
                UPDATE work_messages m
                SET receive_count = m.receive_count + 1,
                    visible_at = NOW() + make_interval(secs => $1),
                    lease = $2
                FROM candidate
                WHERE m.id = candidate.id
                RETURNING m.id, m.payload, m.receive_count
                "#,
            )
            .bind(self.config.visibility_timeout.as_secs_f64())
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;

            let Some(row) = row else {
                return Ok(None);
            };

            let id: i64 = row.try_get("id")?;
            let payload: serde_json::Value = row.try_get("payload")?;
            let receive_count: i32 = row.try_get("receive_count")?;

            if receive_count > self.config.max_receive_count {
                tracing::warn!(
                    message_id = id,
                    receive_count = receive_count,
                    max_receive_count = self.config.max_receive_count,
                    "Message exceeded receive limit, moving to dead letters"
                );
                self.mark_dead(id).await?;
                continue;
            }

            let message: WorkMessage = match serde_json::from_value(payload) {
                Ok(message) => message,
                Err(e) => {
                    // Undecodable payloads would redeliver forever; route
                    // them to the dead-letter pool instead.
                    tracing::error!(
                        message_id = id,
                        error = %e,
                        "Failed to decode queued message, moving to dead letters"
                    );
                    self.mark_dead(id).await?;
                    continue;
                }
            };

            return Ok(Some(Delivery {
                message,
                lease: LeaseToken {
                    message_id: id,
                    token,
                },
                receive_count,
            }));
        }
    }

    async fn mark_dead(&self, id: i64) -> QueueResult<()> {
        sqlx::query("UPDATE work_messages SET dead = TRUE, lease = NULL WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl WorkQueue for PgWorkQueue {
    #[tracing::instrument(skip(self, message), fields(media_id = %message.media_id))]
    async fn send(&self, message: &WorkMessage) -> QueueResult<()> {
        let payload =
            serde_json::to_value(message).map_err(|e| QueueError::Encode(e.to_string()))?;

        sqlx::query("INSERT INTO work_messages (payload) VALUES ($1)")
            .bind(payload)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn receive(&self, wait: Duration) -> QueueResult<Option<Delivery>> {
        let deadline = tokio::time::Instant::now() + wait;

        loop {
            if let Some(delivery) = self.try_claim().await? {
                return Ok(Some(delivery));
            }

            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            let sleep_for = (deadline - now).min(CLAIM_POLL_INTERVAL);
            tokio::time::sleep(sleep_for).await;
        }
    }

    async fn ack(&self, lease: &LeaseToken) -> QueueResult<()> {
        let affected = sqlx::query("DELETE FROM work_messages WHERE id = $1 AND lease = $2")
            .bind(lease.message_id)
            .bind(lease.token)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if affected == 0 {
            return Err(QueueError::LeaseExpired);
        }
        Ok(())
    }

    async fn release(&self, lease: &LeaseToken) -> QueueResult<()> {
        let affected = sqlx::query(
            "UPDATE work_messages SET visible_at = NOW(), lease = NULL WHERE id = $1 AND lease = $2",
        )
        .bind(lease.message_id)
        .bind(lease.token)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if affected == 0 {
            return Err(QueueError::LeaseExpired);
        }
        Ok(())
    }

    async fn reject(&self, lease: &LeaseToken) -> QueueResult<()> {
        let affected = sqlx::query(
            "UPDATE work_messages SET dead = TRUE, lease = NULL WHERE id = $1 AND lease = $2",
        )
        .bind(lease.message_id)
        .bind(lease.token)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if affected == 0 {
            return Err(QueueError::LeaseExpired);
        }
        Ok(())
    }

    async fn dead_letter_count(&self) -> QueueResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM work_messages WHERE dead = TRUE")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}
