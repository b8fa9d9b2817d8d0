use async_trait::async_trait;
use chrono::{DateTime, Duration, SubsecRound, Utc};
use logoscope_core::{normalize_email, Account, AppError, CreationChannel, ResolvedAccount};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::rows::{account_from_row, ACCOUNT_COLUMNS};
use super::traits::{AccountStore, FreeSlotReservation};

/// Repository for accounts
#[derive(Clone)]
pub struct AccountRepository {
    pool: PgPool,
}

impl AccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountStore for AccountRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM accounts WHERE id = $1",
            ACCOUNT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(account_from_row).transpose()?)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, AppError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM accounts WHERE email = $1",
            ACCOUNT_COLUMNS
        ))
        .bind(normalize_email(email))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(account_from_row).transpose()?)
    }

    async fn find_or_create(
        &self,
        email: &str,
        display_name: Option<&str>,
        channel: CreationChannel,
    ) -> Result<ResolvedAccount, AppError> {
        let email = normalize_email(email);

        // The unique email index arbitrates concurrent creators; the loser reads the winner's row.
        let inserted = sqlx::query(&format!(
            r#"
            INSERT INTO accounts (id, email, display_name, creation_channel)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (email) DO NOTHING
            RETURNING {}
            "#,
            ACCOUNT_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&email)
        .bind(display_name)
        .bind(channel.to_string())
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = inserted {
            let account = account_from_row(&row)?;
            tracing::info!(
                account_id = %account.id,
                channel = %channel,
                "Account created"
            );
            return Ok(ResolvedAccount {
                account,
                created: true,
            });
        }

        let account = self
            .find_by_email(&email)
            .await?
            .ok_or_else(|| AppError::Internal("Account vanished after conflict".to_string()))?;

        Ok(ResolvedAccount {
            account,
            created: false,
        })
    }

    async fn reserve_free_slot(
        &self,
        account_id: Uuid,
        now: DateTime<Utc>,
        cooldown: Duration,
    ) -> Result<FreeSlotReservation, AppError> {
        // Postgres keeps microseconds; truncate so release can match the stored value exactly.
        let now = now.trunc_subsecs(6);
        let row = sqlx::query(
            r#"
            UPDATE accounts AS a
            SET last_free_analysis_at = $2
            FROM (SELECT id, last_free_analysis_at AS previous FROM accounts WHERE id = $1 FOR UPDATE) AS prev
            WHERE a.id = prev.id
              AND (a.last_free_analysis_at IS NULL OR a.last_free_analysis_at <= $3)
            RETURNING prev.previous
            "#,
        )
        .bind(account_id)
        .bind(now)
        .bind(now - cooldown)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            let previous: Option<DateTime<Utc>> = row.try_get("previous")?;
            return Ok(FreeSlotReservation::Reserved {
                reserved_at: now,
                previous,
            });
        }

        let account = self
            .find_by_id(account_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Account not found".to_string()))?;
        let last = account.last_free_analysis_at.unwrap_or(now);
        Ok(FreeSlotReservation::Exhausted {
            available_at: last + cooldown,
        })
    }

    async fn release_free_slot(
        &self,
        account_id: Uuid,
        reserved_at: DateTime<Utc>,
        previous: Option<DateTime<Utc>>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE accounts
            SET last_free_analysis_at = $3
            WHERE id = $1 AND last_free_analysis_at = $2
            "#,
        )
        .bind(account_id)
        .bind(reserved_at)
        .bind(previous)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
