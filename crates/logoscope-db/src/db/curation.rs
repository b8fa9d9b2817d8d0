use async_trait::async_trait;
use logoscope_core::{Analysis, AppError, CurationSlot};
use sqlx::PgPool;
use std::ops::Range;

use super::rows::{analysis_from_row, slot_from_row};
use super::traits::CurationStore;
use super::transaction::with_transaction;

/// Repository for the home and gallery curation slots
#[derive(Clone)]
pub struct CurationRepository {
    pool: PgPool,
}

impl CurationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CurationStore for CurationRepository {
    async fn replace_all(&self, slots: &[CurationSlot]) -> Result<(), AppError> {
        let slots = slots.to_vec();

        with_transaction(&self.pool, move |tx| {
            Box::pin(async move {
                sqlx::query("DELETE FROM curation_slots")
                    .execute(&mut **tx)
                    .await?;

                for slot in &slots {
                    sqlx::query(
                        "INSERT INTO curation_slots (position, analysis_id) VALUES ($1, $2)",
                    )
                    .bind(slot.position)
                    .bind(slot.analysis_id)
                    .execute(&mut **tx)
                    .await?;
                }

                tracing::info!(slot_count = slots.len(), "Curation slots replaced");
                Ok(())
            })
        })
        .await
    }

    async fn list_all(&self) -> Result<Vec<CurationSlot>, AppError> {
        let rows = sqlx::query(
            "SELECT position, analysis_id FROM curation_slots ORDER BY position ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(slot_from_row)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn list_range(
        &self,
        positions: Range<i32>,
    ) -> Result<Vec<(CurationSlot, Analysis)>, AppError> {
        let rows = sqlx::query(
            r#"
            SELECT
                c.position, c.analysis_id,
                a.id, a.account_id, a.tier, a.status, a.visibility, a.display_name,
                a.display_author, a.display_category, a.asset_key, a.content_type,
                a.inline_asset, a.result, a.partial_result, a.failure_reason, a.share_token,
                a.weekly_featured, a.rejection_reason, a.payment_session_id,
                a.payment_intent_id, a.amount_total_cents, a.run_id, a.run_started_at,
                a.created_at, a.updated_at, a.completed_at, a.deleted_at
            FROM curation_slots c
            JOIN analyses a ON a.id = c.analysis_id
            WHERE c.position >= $1 AND c.position < $2
              AND a.deleted_at IS NULL
            ORDER BY c.position ASC
            "#,
        )
        .bind(positions.start)
        .bind(positions.end)
        .fetch_all(&self.pool)
        .await?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            entries.push((slot_from_row(row)?, analysis_from_row(row)?));
        }
        Ok(entries)
    }
}
