//! Row decoding shared by the repositories.
//!
//! Enums are stored as TEXT and JSON payloads as JSONB; both are decoded here so a
//! bad value surfaces as `sqlx::Error::ColumnDecode` instead of a panic.

use logoscope_core::{
    Account, Analysis, CurationSlot, DisplayMetadata, PaymentCorrelation, StagedSubmission,
};
use serde::de::DeserializeOwned;
use sqlx::postgres::PgRow;
use sqlx::Row;
use std::str::FromStr;

pub(crate) const ANALYSIS_COLUMNS: &str = r#"
    id, account_id, tier, status, visibility, display_name, display_author,
    display_category, asset_key, content_type, inline_asset, result, partial_result,
    failure_reason, share_token, weekly_featured, rejection_reason, payment_session_id,
    payment_intent_id, amount_total_cents, run_id, run_started_at, created_at,
    updated_at, completed_at, deleted_at
"#;

pub(crate) const STAGING_COLUMNS: &str = r#"
    id, session_token, tier, asset_key, content_type, file_size, display_name,
    display_author, display_category, email, account_id, created_at, expires_at
"#;

pub(crate) const ACCOUNT_COLUMNS: &str = r#"
    id, email, display_name, is_admin, last_free_analysis_at, creation_channel, created_at
"#;

fn decode_text<T>(row: &PgRow, column: &str) -> Result<T, sqlx::Error>
where
    T: FromStr<Err = anyhow::Error>,
{
    let raw: String = row.try_get(column)?;
    raw.parse::<T>().map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: e.into(),
    })
}

fn decode_json<T: DeserializeOwned>(row: &PgRow, column: &str) -> Result<Option<T>, sqlx::Error> {
    let value: Option<serde_json::Value> = row.try_get(column)?;
    value
        .map(serde_json::from_value)
        .transpose()
        .map_err(|e| sqlx::Error::ColumnDecode {
            index: column.to_string(),
            source: Box::new(e),
        })
}

fn display_from_row(row: &PgRow) -> Result<DisplayMetadata, sqlx::Error> {
    Ok(DisplayMetadata {
        name: row.try_get("display_name")?,
        author: row.try_get("display_author")?,
        category: row.try_get("display_category")?,
    })
}

pub(crate) fn account_from_row(row: &PgRow) -> Result<Account, sqlx::Error> {
    Ok(Account {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        display_name: row.try_get("display_name")?,
        is_admin: row.try_get("is_admin")?,
        last_free_analysis_at: row.try_get("last_free_analysis_at")?,
        creation_channel: decode_text(row, "creation_channel")?,
        created_at: row.try_get("created_at")?,
    })
}

pub(crate) fn staged_from_row(row: &PgRow) -> Result<StagedSubmission, sqlx::Error> {
    Ok(StagedSubmission {
        id: row.try_get("id")?,
        session_token: row.try_get("session_token")?,
        tier: decode_text(row, "tier")?,
        asset_key: row.try_get("asset_key")?,
        content_type: row.try_get("content_type")?,
        file_size: row.try_get("file_size")?,
        display: display_from_row(row)?,
        email: row.try_get("email")?,
        account_id: row.try_get("account_id")?,
        created_at: row.try_get("created_at")?,
        expires_at: row.try_get("expires_at")?,
    })
}

pub(crate) fn analysis_from_row(row: &PgRow) -> Result<Analysis, sqlx::Error> {
    Ok(Analysis {
        id: row.try_get("id")?,
        account_id: row.try_get("account_id")?,
        tier: decode_text(row, "tier")?,
        status: decode_text(row, "status")?,
        visibility: decode_text(row, "visibility")?,
        display: display_from_row(row)?,
        asset_key: row.try_get("asset_key")?,
        content_type: row.try_get("content_type")?,
        inline_asset: row.try_get("inline_asset")?,
        result: decode_json(row, "result")?,
        partial_result: decode_json(row, "partial_result")?,
        failure_reason: row.try_get("failure_reason")?,
        share_token: row.try_get("share_token")?,
        weekly_featured: row.try_get("weekly_featured")?,
        rejection_reason: row.try_get("rejection_reason")?,
        payment: PaymentCorrelation {
            session_id: row.try_get("payment_session_id")?,
            payment_intent_id: row.try_get("payment_intent_id")?,
            amount_total_cents: row.try_get("amount_total_cents")?,
        },
        run_id: row.try_get("run_id")?,
        run_started_at: row.try_get("run_started_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        completed_at: row.try_get("completed_at")?,
        deleted_at: row.try_get("deleted_at")?,
    })
}

pub(crate) fn slot_from_row(row: &PgRow) -> Result<CurationSlot, sqlx::Error> {
    Ok(CurationSlot {
        position: row.try_get("position")?,
        analysis_id: row.try_get("analysis_id")?,
    })
}
