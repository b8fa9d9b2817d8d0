use async_trait::async_trait;
use chrono::{DateTime, Utc};
use logoscope_core::{
    Analysis, AnalysisReport, AppError, NewAnalysis, PartialReport, Visibility,
};
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::rows::{analysis_from_row, ANALYSIS_COLUMNS};
use super::traits::{AnalysisStore, RunLease};
use super::transaction::with_transaction;

/// Repository for durable analyses
#[derive(Clone)]
pub struct AnalysisRepository {
    pool: PgPool,
}

impl AnalysisRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn insert_sql(on_conflict: &str) -> String {
        format!(
            r#"
            INSERT INTO analyses (
                id, account_id, tier, status, visibility, display_name, display_author,
                display_category, asset_key, content_type, inline_asset, share_token,
                payment_session_id, payment_intent_id, amount_total_cents
            )
            VALUES ($1, $2, $3, 'pending', $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            {}
            RETURNING {}
            "#,
            on_conflict, ANALYSIS_COLUMNS
        )
    }
}

fn bind_new<'q>(
    query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    new: &'q NewAnalysis,
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    query
        .bind(new.id)
        .bind(new.account_id)
        .bind(new.tier.as_str())
        .bind(new.visibility.to_string())
        .bind(&new.display.name)
        .bind(&new.display.author)
        .bind(&new.display.category)
        .bind(&new.asset_key)
        .bind(&new.content_type)
        .bind(&new.inline_asset)
        .bind(&new.share_token)
        .bind(&new.payment.session_id)
        .bind(&new.payment.payment_intent_id)
        .bind(new.payment.amount_total_cents)
}

#[async_trait]
impl AnalysisStore for AnalysisRepository {
    async fn insert_if_absent(&self, new: &NewAnalysis) -> Result<bool, AppError> {
        let sql = Self::insert_sql("ON CONFLICT (id) DO NOTHING");
        let inserted = bind_new(sqlx::query(&sql), new)
            .fetch_optional(&self.pool)
            .await?;

        Ok(inserted.is_some())
    }

    async fn create_from_staging(&self, new: &NewAnalysis) -> Result<Option<Analysis>, AppError> {
        let new = new.clone();
        let sql = Self::insert_sql("");

        with_transaction(&self.pool, move |tx| {
            Box::pin(async move {
                let consumed = sqlx::query("DELETE FROM staged_submissions WHERE id = $1 RETURNING id")
                    .bind(new.id)
                    .fetch_optional(&mut **tx)
                    .await?;

                if consumed.is_none() {
                    return Ok(None);
                }

                let row = bind_new(sqlx::query(&sql), &new)
                    .fetch_one(&mut **tx)
                    .await?;

                Ok(Some(analysis_from_row(&row)?))
            })
        })
        .await
    }

    async fn get(&self, id: Uuid) -> Result<Option<Analysis>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM analyses WHERE id = $1",
            ANALYSIS_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(analysis_from_row).transpose()?)
    }

    async fn get_by_share_token(&self, token: &str) -> Result<Option<Analysis>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM analyses WHERE share_token = $1",
            ANALYSIS_COLUMNS
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(analysis_from_row).transpose()?)
    }

    async fn list_for_account(&self, account_id: Uuid) -> Result<Vec<Analysis>, AppError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM analyses
            WHERE account_id = $1 AND deleted_at IS NULL
            ORDER BY created_at DESC
            "#,
            ANALYSIS_COLUMNS
        ))
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(analysis_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn list_by_visibility(
        &self,
        visibility: Visibility,
        limit: i64,
    ) -> Result<Vec<Analysis>, AppError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM analyses
            WHERE visibility = $1 AND deleted_at IS NULL
            ORDER BY created_at ASC
            LIMIT $2
            "#,
            ANALYSIS_COLUMNS
        ))
        .bind(visibility.to_string())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(analysis_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn begin_run(
        &self,
        lease: RunLease,
        now: DateTime<Utc>,
        stale_before: DateTime<Utc>,
    ) -> Result<Option<Analysis>, AppError> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE analyses
            SET status = 'processing', run_id = $2, run_started_at = $3, updated_at = $3
            WHERE id = $1
              AND deleted_at IS NULL
              AND (
                status = 'pending'
                OR (status = 'processing' AND (run_id IS NULL OR run_started_at < $4))
              )
            RETURNING {}
            "#,
            ANALYSIS_COLUMNS
        ))
        .bind(lease.analysis_id)
        .bind(lease.run_id)
        .bind(now)
        .bind(stale_before)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(analysis_from_row).transpose()?)
    }

    async fn complete_run(
        &self,
        lease: RunLease,
        report: &AnalysisReport,
        now: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE analyses
            SET status = 'completed', result = $3, partial_result = NULL,
                failure_reason = NULL, run_id = NULL, run_started_at = NULL,
                completed_at = $4, updated_at = $4
            WHERE id = $1 AND run_id = $2 AND status = 'processing'
            "#,
        )
        .bind(lease.analysis_id)
        .bind(lease.run_id)
        .bind(Json(report))
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn fail_run(
        &self,
        lease: RunLease,
        reason: &str,
        partial: Option<&PartialReport>,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE analyses
            SET status = 'failed', failure_reason = $3, partial_result = $4,
                run_id = NULL, run_started_at = NULL, updated_at = NOW()
            WHERE id = $1 AND run_id = $2 AND status = 'processing'
            "#,
        )
        .bind(lease.analysis_id)
        .bind(lease.run_id)
        .bind(reason)
        .bind(partial.map(Json))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn release_run(&self, lease: RunLease) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE analyses
            SET run_id = NULL, run_started_at = NULL, updated_at = NOW()
            WHERE id = $1 AND run_id = $2 AND status = 'processing'
            "#,
        )
        .bind(lease.analysis_id)
        .bind(lease.run_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn restart(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE analyses
            SET status = 'pending', failure_reason = NULL, partial_result = NULL,
                updated_at = NOW()
            WHERE id = $1 AND status = 'failed' AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn ensure_share_token(&self, id: Uuid, token: &str) -> Result<Option<String>, AppError> {
        let row = sqlx::query(
            r#"
            UPDATE analyses
            SET share_token = COALESCE(share_token, $2), updated_at = NOW()
            WHERE id = $1 AND tier <> 'free' AND deleted_at IS NULL
            RETURNING share_token
            "#,
        )
        .bind(id)
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(row.try_get::<Option<String>, _>("share_token")?),
            None => Ok(None),
        }
    }

    async fn transition_visibility(
        &self,
        id: Uuid,
        from: &[Visibility],
        to: Visibility,
        rejection_reason: Option<&str>,
    ) -> Result<bool, AppError> {
        let from: Vec<String> = from.iter().map(|v| v.to_string()).collect();
        let result = sqlx::query(
            r#"
            UPDATE analyses
            SET visibility = $3, rejection_reason = $4, updated_at = NOW()
            WHERE id = $1 AND visibility = ANY($2) AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(&from)
        .bind(to.to_string())
        .bind(rejection_reason)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn set_weekly_featured(&self, id: Uuid, featured: bool) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE analyses
            SET weekly_featured = $2, updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(featured)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn soft_delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE analyses
            SET deleted_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
