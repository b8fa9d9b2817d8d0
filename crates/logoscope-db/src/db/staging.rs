use async_trait::async_trait;
use chrono::{DateTime, Utc};
use logoscope_core::{AppError, StagedSubmission};
use sqlx::PgPool;
use uuid::Uuid;

use super::rows::{staged_from_row, STAGING_COLUMNS};
use super::traits::StagingStore;

/// Repository for staged submissions
#[derive(Clone)]
pub struct StagingRepository {
    pool: PgPool,
}

impl StagingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StagingStore for StagingRepository {
    async fn insert(&self, staged: &StagedSubmission) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO staged_submissions (
                id, session_token, tier, asset_key, content_type, file_size,
                display_name, display_author, display_category, email, account_id,
                created_at, expires_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(staged.id)
        .bind(&staged.session_token)
        .bind(staged.tier.as_str())
        .bind(&staged.asset_key)
        .bind(&staged.content_type)
        .bind(staged.file_size)
        .bind(&staged.display.name)
        .bind(&staged.display.author)
        .bind(&staged.display.category)
        .bind(&staged.email)
        .bind(staged.account_id)
        .bind(staged.created_at)
        .bind(staged.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<StagedSubmission>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM staged_submissions WHERE id = $1",
            STAGING_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(staged_from_row).transpose()?)
    }

    async fn consume(&self, id: Uuid) -> Result<Option<StagedSubmission>, AppError> {
        let row = sqlx::query(&format!(
            "DELETE FROM staged_submissions WHERE id = $1 RETURNING {}",
            STAGING_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(staged_from_row).transpose()?)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<Vec<StagedSubmission>, AppError> {
        let rows = sqlx::query(&format!(
            "DELETE FROM staged_submissions WHERE expires_at <= $1 RETURNING {}",
            STAGING_COLUMNS
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(staged_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }
}
