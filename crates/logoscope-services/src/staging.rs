//! Ephemeral staging intake
//!
//! An upload is validated against the policy, written to the ephemeral store under
//! `staging/{id}/original.{ext}` and recorded as an immutable staging row. The row is
//! later consumed exactly once, by a free claim or by payment reconciliation.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use image::ImageFormat;
use logoscope_core::{
    AppError, Config, DisplayMetadata, Requester, StagedSubmission, Tier,
};
use logoscope_db::{AccountStore, StagingStore};
use logoscope_storage::{keys, Storage};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use validator::Validate;

const MAX_SESSION_TOKEN_LEN: usize = 128;

/// Upload and lifecycle limits applied at intake.
#[derive(Debug, Clone)]
pub struct StagingPolicy {
    pub max_file_size_bytes: usize,
    pub allowed_content_types: Vec<String>,
    pub allowed_extensions: Vec<String>,
    pub ttl: ChronoDuration,
    pub free_tier_cooldown: ChronoDuration,
}

impl StagingPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_file_size_bytes: config.max_file_size_bytes(),
            allowed_content_types: config.allowed_content_types().to_vec(),
            allowed_extensions: config.allowed_extensions().to_vec(),
            ttl: ChronoDuration::hours(config.staging_ttl_hours()),
            free_tier_cooldown: ChronoDuration::hours(config.free_tier_cooldown_hours()),
        }
    }
}

/// A raw upload as received by the API.
#[derive(Debug, Clone)]
pub struct StageRequest {
    pub session_token: String,
    pub tier: Tier,
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
    pub display: DisplayMetadata,
    pub email: Option<String>,
}

/// Strip MIME parameters and case-fold (`image/PNG; q=1` -> `image/png`).
fn normalize_mime_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
        .to_lowercase()
}

fn raster_format(content_type: &str) -> Option<ImageFormat> {
    match content_type {
        "image/png" => Some(ImageFormat::Png),
        "image/jpeg" => Some(ImageFormat::Jpeg),
        "image/webp" => Some(ImageFormat::WebP),
        "image/gif" => Some(ImageFormat::Gif),
        _ => None,
    }
}

fn looks_like_svg(data: &[u8]) -> bool {
    let head = &data[..data.len().min(1024)];
    let text = String::from_utf8_lossy(head);
    let trimmed = text.trim_start_matches('\u{feff}').trim_start();
    (trimmed.starts_with("<svg") || trimmed.starts_with("<?xml"))
        && text.contains("<svg")
}

/// Check an upload against the policy. Returns the normalized content type and
/// extension to store it under.
pub fn validate_upload(
    policy: &StagingPolicy,
    filename: &str,
    content_type: &str,
    data: &[u8],
) -> Result<(String, String), AppError> {
    if data.is_empty() {
        return Err(AppError::Validation("Uploaded file is empty".to_string()));
    }

    if data.len() > policy.max_file_size_bytes {
        return Err(AppError::PayloadTooLarge(format!(
            "File size exceeds maximum allowed size of {} MB",
            policy.max_file_size_bytes / 1024 / 1024
        )));
    }

    let content_type = normalize_mime_type(content_type);
    if !policy.allowed_content_types.contains(&content_type) {
        return Err(AppError::Validation(format!(
            "Invalid content type. Allowed types: {}",
            policy.allowed_content_types.join(", ")
        )));
    }

    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();
    if !policy.allowed_extensions.contains(&extension) {
        return Err(AppError::Validation(format!(
            "Invalid file extension. Allowed extensions: {}",
            policy.allowed_extensions.join(", ")
        )));
    }

    let matches_declared = match raster_format(&content_type) {
        Some(expected) => image::guess_format(data).map(|f| f == expected).unwrap_or(false),
        None if content_type == "image/svg+xml" => looks_like_svg(data),
        None => true,
    };
    if !matches_declared {
        return Err(AppError::Validation(format!(
            "File content does not match declared type {}",
            content_type
        )));
    }

    Ok((content_type, extension))
}

#[derive(Clone)]
pub struct StagingService {
    staging: Arc<dyn StagingStore>,
    accounts: Arc<dyn AccountStore>,
    ephemeral: Arc<dyn Storage>,
    policy: StagingPolicy,
}

impl StagingService {
    pub fn new(
        staging: Arc<dyn StagingStore>,
        accounts: Arc<dyn AccountStore>,
        ephemeral: Arc<dyn Storage>,
        policy: StagingPolicy,
    ) -> Self {
        Self {
            staging,
            accounts,
            ephemeral,
            policy,
        }
    }

    /// Validate and stage an upload.
    #[tracing::instrument(skip(self, request, requester), fields(tier = %request.tier, size = request.data.len()))]
    pub async fn stage(
        &self,
        request: StageRequest,
        requester: Option<&Requester>,
    ) -> Result<StagedSubmission, AppError> {
        let session_token = request.session_token.trim().to_string();
        if session_token.is_empty() || session_token.len() > MAX_SESSION_TOKEN_LEN {
            return Err(AppError::Validation(
                "session_token must be 1-128 characters".to_string(),
            ));
        }

        let (content_type, extension) = validate_upload(
            &self.policy,
            &request.filename,
            &request.content_type,
            &request.data,
        )?;
        request.display.validate()?;

        let email = match request.email.as_deref().map(str::trim) {
            Some(email) if !email.is_empty() => {
                email.parse::<lettre::Address>().map_err(|_| {
                    AppError::Validation("email is not a valid address".to_string())
                })?;
                Some(email.to_string())
            }
            _ => None,
        };

        let now = Utc::now();
        if request.tier == Tier::Free {
            if let Some(requester) = requester {
                self.ensure_free_slot_available(requester, now).await?;
            }
        }

        let id = Uuid::new_v4();
        let asset_key = keys::staging_key(id, &extension);
        let file_size = request.data.len() as i64;

        self.ephemeral
            .upload_with_key(&asset_key, request.data, &content_type)
            .await?;

        let staged = StagedSubmission {
            id,
            session_token,
            tier: request.tier,
            asset_key,
            content_type,
            file_size,
            display: request.display,
            email,
            account_id: requester.map(|r| r.account_id),
            created_at: now,
            expires_at: now + self.policy.ttl,
        };

        if let Err(e) = self.staging.insert(&staged).await {
            if let Err(cleanup_err) = self.ephemeral.delete(&staged.asset_key).await {
                tracing::warn!(
                    error = %cleanup_err,
                    asset_key = %staged.asset_key,
                    "Failed to remove orphaned staged asset"
                );
            }
            return Err(e);
        }

        tracing::info!(
            staging_id = %staged.id,
            tier = %staged.tier,
            file_size = staged.file_size,
            "Submission staged"
        );

        Ok(staged)
    }

    async fn ensure_free_slot_available(
        &self,
        requester: &Requester,
        now: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let account = self
            .accounts
            .find_by_id(requester.account_id)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Account no longer exists".to_string()))?;

        if let Some(last) = account.last_free_analysis_at {
            let available_at = last + self.policy.free_tier_cooldown;
            if available_at > now {
                return Err(AppError::FreeTierLimit(format!(
                    "Free analysis available again at {}",
                    available_at.to_rfc3339()
                )));
            }
        }
        Ok(())
    }

    /// Delete expired staging rows and their assets. Cleanup only; nothing relies on it
    /// for correctness.
    pub async fn purge_expired(&self) -> Result<usize, AppError> {
        let expired = self.staging.purge_expired(Utc::now()).await?;

        for staged in &expired {
            if let Err(e) = self.ephemeral.delete(&staged.asset_key).await {
                tracing::warn!(
                    error = %e,
                    staging_id = %staged.id,
                    asset_key = %staged.asset_key,
                    "Failed to delete expired staged asset"
                );
            }
        }

        Ok(expired.len())
    }

    /// Run [`purge_expired`](Self::purge_expired) every `interval` until `shutdown` fires.
    pub fn start_sweeper(
        self: Arc<Self>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        tracing::info!("Staging sweeper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        match self.purge_expired().await {
                            Ok(0) => {}
                            Ok(count) => tracing::info!(count, "Expired staged submissions purged"),
                            Err(e) => tracing::error!(error = %e, "Staging sweep failed"),
                        }
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{png_bytes, MemoryStorage};
    use logoscope_db::test_helpers::InMemoryStore;

    fn policy() -> StagingPolicy {
        StagingPolicy {
            max_file_size_bytes: 1024 * 1024,
            allowed_content_types: vec![
                "image/png".to_string(),
                "image/jpeg".to_string(),
                "image/svg+xml".to_string(),
            ],
            allowed_extensions: vec!["png".to_string(), "jpg".to_string(), "svg".to_string()],
            ttl: ChronoDuration::hours(24),
            free_tier_cooldown: ChronoDuration::hours(24),
        }
    }

    fn request(tier: Tier) -> StageRequest {
        StageRequest {
            session_token: "sess-1".to_string(),
            tier,
            filename: "logo.png".to_string(),
            content_type: "image/png".to_string(),
            data: png_bytes(),
            display: DisplayMetadata {
                name: "Acme".to_string(),
                author: Some("Jo".to_string()),
                category: None,
            },
            email: None,
        }
    }

    fn service(store: &InMemoryStore, storage: &MemoryStorage) -> StagingService {
        StagingService::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(storage.clone()),
            policy(),
        )
    }

    #[test]
    fn test_validate_upload_rejects_mismatched_bytes() {
        let err = validate_upload(&policy(), "logo.png", "image/png", b"GIF89a....").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_validate_upload_limits() {
        let policy = policy();
        assert!(matches!(
            validate_upload(&policy, "logo.png", "image/png", &[]),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            validate_upload(&policy, "logo.png", "image/png", &vec![0u8; 2 * 1024 * 1024]),
            Err(AppError::PayloadTooLarge(_))
        ));
        assert!(matches!(
            validate_upload(&policy, "logo.exe", "image/png", &png_bytes()),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            validate_upload(&policy, "logo.pdf", "application/pdf", b"%PDF"),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_validate_upload_normalizes_type() {
        let (content_type, ext) =
            validate_upload(&policy(), "Logo.PNG", "image/PNG; charset=binary", &png_bytes())
                .unwrap();
        assert_eq!(content_type, "image/png");
        assert_eq!(ext, "png");
    }

    #[test]
    fn test_validate_upload_svg() {
        let svg = br#"<svg xmlns="http://www.w3.org/2000/svg"><circle r="4"/></svg>"#;
        assert!(validate_upload(&policy(), "logo.svg", "image/svg+xml", svg).is_ok());
        assert!(validate_upload(&policy(), "logo.svg", "image/svg+xml", b"hello").is_err());
    }

    #[tokio::test]
    async fn test_stage_writes_asset_and_row() {
        let store = InMemoryStore::new();
        let storage = MemoryStorage::new();
        let staged = service(&store, &storage)
            .stage(request(Tier::Paid), None)
            .await
            .unwrap();

        assert_eq!(staged.asset_key, format!("staging/{}/original.png", staged.id));
        assert!(storage.contains(&staged.asset_key));
        assert!(store.staged(staged.id).is_some());
        assert_eq!(staged.expires_at - staged.created_at, ChronoDuration::hours(24));
    }

    #[tokio::test]
    async fn test_stage_rejects_invalid_display_and_email() {
        let store = InMemoryStore::new();
        let storage = MemoryStorage::new();
        let service = service(&store, &storage);

        let mut nameless = request(Tier::Paid);
        nameless.display.name = String::new();
        assert!(matches!(
            service.stage(nameless, None).await,
            Err(AppError::Validation(_))
        ));

        let mut bad_email = request(Tier::Paid);
        bad_email.email = Some("not-an-email".to_string());
        assert!(matches!(
            service.stage(bad_email, None).await,
            Err(AppError::Validation(_))
        ));
        assert_eq!(store.staging_count(), 0);
        assert_eq!(storage.len(), 0);
    }

    #[tokio::test]
    async fn test_free_stage_rejected_within_cooldown() {
        let store = InMemoryStore::new();
        let storage = MemoryStorage::new();
        let account = store.seed_account("free@example.com", false);
        store.set_last_free_analysis(account.id, Some(Utc::now() - ChronoDuration::hours(2)));
        let requester = Requester {
            account_id: account.id,
            is_admin: false,
        };

        let result = service(&store, &storage)
            .stage(request(Tier::Free), Some(&requester))
            .await;
        assert!(matches!(result, Err(AppError::FreeTierLimit(_))));
        assert_eq!(storage.len(), 0);
    }

    #[tokio::test]
    async fn test_purge_expired_removes_assets() {
        let store = InMemoryStore::new();
        let storage = MemoryStorage::new();
        let mut policy = policy();
        policy.ttl = ChronoDuration::seconds(-1);
        let service = StagingService::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(storage.clone()),
            policy,
        );

        let staged = service.stage(request(Tier::Paid), None).await.unwrap();
        assert_eq!(service.purge_expired().await.unwrap(), 1);
        assert!(store.staged(staged.id).is_none());
        assert!(!storage.contains(&staged.asset_key));
    }
}
