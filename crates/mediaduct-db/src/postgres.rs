use crate::traits::{
    MediaPatch, MetadataError, MetadataResult, MetadataStore, StatusExpectation, UpdateOutcome,
};
use async_trait::async_trait;
use mediaduct_core::MediaItem;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

/// PostgreSQL-backed metadata store.
///
/// Queries are written as dynamic statements with explicit binds so the
/// crate builds without a live database connection.
#[derive(Clone)]
pub struct PgMetadataStore {
    pool: PgPool,
}

impl PgMetadataStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MetadataStore for PgMetadataStore {
    #[tracing::instrument(skip(self, item), fields(db.table = "media_items", db.operation = "insert", db.record_id = %item.id))]
    async fn create(&self, item: &MediaItem) -> MetadataResult<()> {
        sqlx::query(
            r#"
            INSERT INTO media_items (
                id, file_name, content_type, original_key, processed_key,
                status, attempts, created_at, processed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(item.id)
        .bind(&item.file_name)
        .bind(&item.content_type)
        .bind(&item.original_key)
        .bind(&item.processed_key)
        .bind(item.status.to_string())
        .bind(item.attempts)
        .bind(item.created_at)
        .bind(item.processed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                MetadataError::Duplicate(item.id)
            }
            _ => MetadataError::Database(e),
        })?;

        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "media_items", db.operation = "select", db.record_id = %id))]
    async fn get(&self, id: Uuid) -> MetadataResult<Option<MediaItem>> {
        let item: Option<MediaItem> =
            sqlx::query_as::<Postgres, MediaItem>("SELECT * FROM media_items WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(item)
    }

    #[tracing::instrument(skip(self, expect, patch), fields(db.table = "media_items", db.operation = "update", db.record_id = %id, new_status = %patch.status))]
    async fn conditional_update(
        &self,
        id: Uuid,
        expect: StatusExpectation,
        patch: MediaPatch,
    ) -> MetadataResult<UpdateOutcome> {
        let expected: Vec<String> = expect.any_of.iter().map(|s| s.to_string()).collect();
        let bump: i32 = if patch.bump_attempts { 1 } else { 0 };

        // Same statement with or without the attempts ceiling; bind order
        // must match the chosen variant.
        let sql = if expect.attempts_below.is_some() {
            r#"
            UPDATE media_items
            SET status = $2,
                processed_key = COALESCE($3, processed_key),
                processed_at = COALESCE($4, processed_at),
                attempts = attempts + $5
            WHERE id = $1 AND status = ANY($6) AND attempts < $7
            RETURNING *
            "#
        } else {
            r#"
            UPDATE media_items
            SET status = $2,
                processed_key = COALESCE($3, processed_key),
                processed_at = COALESCE($4, processed_at),
                attempts = attempts + $5
            WHERE id = $1 AND status = ANY($6)
            RETURNING *
            "#
        };

        let mut query = sqlx::query_as::<Postgres, MediaItem>(sql)
            .bind(id)
            .bind(patch.status.to_string())
            .bind(&patch.processed_key)
            .bind(patch.processed_at)
            .bind(bump)
            .bind(&expected);

        if let Some(ceiling) = expect.attempts_below {
            query = query.bind(ceiling);
        }

        let row = query.fetch_optional(&self.pool).await?;

        Ok(match row {
            Some(item) => UpdateOutcome::Applied(item),
            None => UpdateOutcome::Conflict,
        })
    }
}
