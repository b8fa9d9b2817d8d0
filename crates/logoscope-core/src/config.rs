//! Configuration module
//!
//! Environment-driven configuration for the API service: server, database, storage,
//! payments, content provider, pipeline tuning and notifications.

use std::env;

use crate::storage_types::StorageBackend;

// Common constants
const MAX_CONNECTIONS: u32 = 20;
const CONNECTION_TIMEOUT_SECS: u64 = 30;
const SESSION_EXPIRY_HOURS: i64 = 24 * 7;
const SIGN_IN_LINK_EXPIRY_MINUTES: i64 = 30;

/// Base configuration shared by every process
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub jwt_secret: String,
    pub session_expiry_hours: i64,
    pub sign_in_link_expiry_minutes: i64,
    pub environment: String,
}

/// Logoscope service configuration
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub base: BaseConfig,
    pub database_url: String,
    // Storage configuration
    pub storage_backend: Option<StorageBackend>,
    pub s3_bucket: Option<String>,
    /// Bucket for ephemeral staged uploads; falls back to `s3_bucket` with a lifecycle rule on `staging/`.
    pub s3_staging_bucket: Option<String>,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>,
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
    // Upload policy
    pub max_file_size_bytes: usize,
    pub allowed_extensions: Vec<String>,
    pub allowed_content_types: Vec<String>,
    pub inline_asset_max_bytes: usize,
    // Staging lifecycle
    pub staging_ttl_hours: i64,
    /// Seconds between expired-staging sweeps. 0 = disabled.
    pub staging_sweep_interval_secs: u64,
    pub free_tier_cooldown_hours: i64,
    // Payments (Stripe wire format)
    pub stripe_secret_key: Option<String>,
    pub stripe_webhook_secret: Option<String>,
    pub stripe_api_base: String,
    pub payment_webhook_tolerance_secs: i64,
    // Content provider (Anthropic Messages API)
    pub anthropic_api_key: Option<String>,
    pub anthropic_api_base: String,
    pub anthropic_vision_model: String,
    pub anthropic_extraction_model: String,
    // Pipeline tuning
    pub analysis_call_timeout_secs: u64,
    pub analysis_max_concurrent_calls: usize,
    pub analysis_detail_description_chars: usize,
    pub pipeline_keepalive_secs: u64,
    pub pipeline_stale_run_secs: i64,
    // Email notifications
    pub email_enabled: bool,
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_from: Option<String>,
    pub smtp_tls: bool,
    pub frontend_url: String,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<ServiceConfig>);

impl Config {
    fn inner(&self) -> &ServiceConfig {
        &self.0
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.inner().base.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        Ok(Config(Box::new(ServiceConfig::from_env()?)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.inner().validate()
    }

    pub fn server_port(&self) -> u16 {
        self.inner().base.server_port
    }

    pub fn environment(&self) -> &str {
        &self.inner().base.environment
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.inner().base.cors_origins
    }

    pub fn db_max_connections(&self) -> u32 {
        self.inner().base.db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.inner().base.db_timeout_seconds
    }

    pub fn jwt_secret(&self) -> &str {
        &self.inner().base.jwt_secret
    }

    pub fn session_expiry_hours(&self) -> i64 {
        self.inner().base.session_expiry_hours
    }

    pub fn sign_in_link_expiry_minutes(&self) -> i64 {
        self.inner().base.sign_in_link_expiry_minutes
    }

    pub fn database_url(&self) -> &str {
        &self.inner().database_url
    }

    pub fn storage_backend(&self) -> Option<StorageBackend> {
        self.inner().storage_backend
    }

    pub fn s3_bucket(&self) -> Option<&str> {
        self.inner().s3_bucket.as_deref()
    }

    pub fn s3_staging_bucket(&self) -> Option<&str> {
        self.inner().s3_staging_bucket.as_deref()
    }

    pub fn s3_region(&self) -> Option<&str> {
        self.inner().s3_region.as_deref()
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.inner().s3_endpoint.as_deref()
    }

    pub fn local_storage_path(&self) -> Option<&str> {
        self.inner().local_storage_path.as_deref()
    }

    pub fn local_storage_base_url(&self) -> Option<&str> {
        self.inner().local_storage_base_url.as_deref()
    }

    pub fn max_file_size_bytes(&self) -> usize {
        self.inner().max_file_size_bytes
    }

    pub fn allowed_extensions(&self) -> &[String] {
        &self.inner().allowed_extensions
    }

    pub fn allowed_content_types(&self) -> &[String] {
        &self.inner().allowed_content_types
    }

    pub fn inline_asset_max_bytes(&self) -> usize {
        self.inner().inline_asset_max_bytes
    }

    pub fn staging_ttl_hours(&self) -> i64 {
        self.inner().staging_ttl_hours
    }

    pub fn staging_sweep_interval_secs(&self) -> u64 {
        self.inner().staging_sweep_interval_secs
    }

    pub fn free_tier_cooldown_hours(&self) -> i64 {
        self.inner().free_tier_cooldown_hours
    }

    pub fn stripe_secret_key(&self) -> Option<&str> {
        self.inner().stripe_secret_key.as_deref()
    }

    pub fn stripe_webhook_secret(&self) -> Option<&str> {
        self.inner().stripe_webhook_secret.as_deref()
    }

    pub fn stripe_api_base(&self) -> &str {
        &self.inner().stripe_api_base
    }

    pub fn payment_webhook_tolerance_secs(&self) -> i64 {
        self.inner().payment_webhook_tolerance_secs
    }

    pub fn anthropic_api_key(&self) -> Option<&str> {
        self.inner().anthropic_api_key.as_deref()
    }

    pub fn anthropic_api_base(&self) -> &str {
        &self.inner().anthropic_api_base
    }

    pub fn anthropic_vision_model(&self) -> &str {
        &self.inner().anthropic_vision_model
    }

    pub fn anthropic_extraction_model(&self) -> &str {
        &self.inner().anthropic_extraction_model
    }

    pub fn analysis_call_timeout_secs(&self) -> u64 {
        self.inner().analysis_call_timeout_secs
    }

    pub fn analysis_max_concurrent_calls(&self) -> usize {
        self.inner().analysis_max_concurrent_calls
    }

    pub fn analysis_detail_description_chars(&self) -> usize {
        self.inner().analysis_detail_description_chars
    }

    pub fn pipeline_keepalive_secs(&self) -> u64 {
        self.inner().pipeline_keepalive_secs
    }

    pub fn pipeline_stale_run_secs(&self) -> i64 {
        self.inner().pipeline_stale_run_secs
    }

    pub fn email_enabled(&self) -> bool {
        self.inner().email_enabled
    }

    pub fn smtp_host(&self) -> Option<&str> {
        self.inner().smtp_host.as_deref()
    }

    pub fn smtp_port(&self) -> Option<u16> {
        self.inner().smtp_port
    }

    pub fn smtp_user(&self) -> Option<&str> {
        self.inner().smtp_user.as_deref()
    }

    pub fn smtp_password(&self) -> Option<&str> {
        self.inner().smtp_password.as_deref()
    }

    pub fn smtp_from(&self) -> Option<&str> {
        self.inner().smtp_from.as_deref()
    }

    pub fn smtp_tls(&self) -> bool {
        self.inner().smtp_tls
    }

    pub fn frontend_url(&self) -> &str {
        &self.inner().frontend_url
    }
}

fn parse_or<T: std::str::FromStr + ToString + Copy>(key: &str, default: T) -> T {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .trim()
        .to_lowercase()
        .parse()
        .unwrap_or(default)
}

fn list_or(key: &str, default: &str) -> Vec<String> {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        const MAX_FILE_SIZE_MB: usize = 10;
        const INLINE_ASSET_MAX_BYTES: usize = 256 * 1024;
        const STAGING_TTL_HOURS: i64 = 24;
        const STAGING_SWEEP_INTERVAL_SECS: u64 = 900;
        const FREE_TIER_COOLDOWN_HOURS: i64 = 24;
        const PAYMENT_WEBHOOK_TOLERANCE_SECS: i64 = 300;
        const ANALYSIS_CALL_TIMEOUT_SECS: u64 = 90;
        const ANALYSIS_MAX_CONCURRENT_CALLS: usize = 4;
        const ANALYSIS_DETAIL_DESCRIPTION_CHARS: usize = 2_000;
        const PIPELINE_KEEPALIVE_SECS: u64 = 5;
        const PIPELINE_STALE_RUN_SECS: i64 = 600;

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());
        let is_production =
            environment.to_lowercase() == "production" || environment.to_lowercase() == "prod";
        if is_production && cors_origins_str.trim() == "*" {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        let cors_origins: Vec<String> = cors_origins_str
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();

        let base = BaseConfig {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| "4000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            cors_origins,
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", MAX_CONNECTIONS),
            db_timeout_seconds: parse_or("DB_TIMEOUT_SECONDS", CONNECTION_TIMEOUT_SECS),
            jwt_secret: env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET must be set for authentication"))?,
            session_expiry_hours: parse_or("SESSION_EXPIRY_HOURS", SESSION_EXPIRY_HOURS),
            sign_in_link_expiry_minutes: parse_or(
                "SIGN_IN_LINK_EXPIRY_MINUTES",
                SIGN_IN_LINK_EXPIRY_MINUTES,
            ),
            environment,
        };

        let storage_backend = env::var("STORAGE_BACKEND")
            .ok()
            .and_then(|s| s.parse::<StorageBackend>().ok());

        let config = ServiceConfig {
            base,
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            storage_backend,
            s3_bucket: env::var("S3_BUCKET").ok(),
            s3_staging_bucket: env::var("S3_STAGING_BUCKET").ok().filter(|s| !s.is_empty()),
            s3_region: env::var("S3_REGION")
                .or_else(|_| env::var("AWS_REGION"))
                .ok(),
            s3_endpoint: env::var("S3_ENDPOINT").ok(),
            local_storage_path: env::var("LOCAL_STORAGE_PATH").ok(),
            local_storage_base_url: env::var("LOCAL_STORAGE_BASE_URL").ok(),
            max_file_size_bytes: parse_or("MAX_FILE_SIZE_MB", MAX_FILE_SIZE_MB) * 1024 * 1024,
            allowed_extensions: list_or("ALLOWED_EXTENSIONS", "png,jpg,jpeg,webp,svg,gif"),
            allowed_content_types: list_or(
                "ALLOWED_CONTENT_TYPES",
                "image/png,image/jpeg,image/webp,image/svg+xml,image/gif",
            ),
            inline_asset_max_bytes: parse_or("INLINE_ASSET_MAX_BYTES", INLINE_ASSET_MAX_BYTES),
            staging_ttl_hours: parse_or("STAGING_TTL_HOURS", STAGING_TTL_HOURS),
            staging_sweep_interval_secs: parse_or(
                "STAGING_SWEEP_INTERVAL_SECS",
                STAGING_SWEEP_INTERVAL_SECS,
            ),
            free_tier_cooldown_hours: parse_or("FREE_TIER_COOLDOWN_HOURS", FREE_TIER_COOLDOWN_HOURS),
            stripe_secret_key: env::var("STRIPE_SECRET_KEY").ok().filter(|s| !s.is_empty()),
            stripe_webhook_secret: env::var("STRIPE_WEBHOOK_SECRET")
                .ok()
                .filter(|s| !s.is_empty()),
            stripe_api_base: env::var("STRIPE_API_BASE")
                .unwrap_or_else(|_| "https://api.stripe.com".to_string()),
            payment_webhook_tolerance_secs: parse_or(
                "PAYMENT_WEBHOOK_TOLERANCE_SECS",
                PAYMENT_WEBHOOK_TOLERANCE_SECS,
            ),
            anthropic_api_key: env::var("ANTHROPIC_API_KEY").ok().filter(|s| !s.is_empty()),
            anthropic_api_base: env::var("ANTHROPIC_API_BASE")
                .unwrap_or_else(|_| "https://api.anthropic.com".to_string()),
            anthropic_vision_model: env::var("ANTHROPIC_VISION_MODEL")
                .unwrap_or_else(|_| "claude-sonnet-4-20250514".to_string()),
            anthropic_extraction_model: env::var("ANTHROPIC_EXTRACTION_MODEL")
                .unwrap_or_else(|_| "claude-sonnet-4-20250514".to_string()),
            analysis_call_timeout_secs: parse_or(
                "ANALYSIS_CALL_TIMEOUT_SECS",
                ANALYSIS_CALL_TIMEOUT_SECS,
            ),
            analysis_max_concurrent_calls: parse_or(
                "ANALYSIS_MAX_CONCURRENT_CALLS",
                ANALYSIS_MAX_CONCURRENT_CALLS,
            ),
            analysis_detail_description_chars: parse_or(
                "ANALYSIS_DETAIL_DESCRIPTION_CHARS",
                ANALYSIS_DETAIL_DESCRIPTION_CHARS,
            ),
            pipeline_keepalive_secs: parse_or("PIPELINE_KEEPALIVE_SECS", PIPELINE_KEEPALIVE_SECS),
            pipeline_stale_run_secs: parse_or("PIPELINE_STALE_RUN_SECS", PIPELINE_STALE_RUN_SECS),
            email_enabled: parse_or("EMAIL_ENABLED", false),
            smtp_host: env::var("SMTP_HOST").ok().filter(|s| !s.is_empty()),
            smtp_port: env::var("SMTP_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|&p| p > 0),
            smtp_user: env::var("SMTP_USER").ok().filter(|s| !s.is_empty()),
            smtp_password: env::var("SMTP_PASSWORD").ok().filter(|s| !s.is_empty()),
            smtp_from: env::var("SMTP_FROM").ok().filter(|s| !s.is_empty()),
            smtp_tls: parse_or("SMTP_TLS", true),
            frontend_url: env::var("FRONTEND_URL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "http://localhost:3000".to_string()),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.base.jwt_secret.len() < 32 {
            return Err(anyhow::anyhow!(
                "JWT_SECRET must be at least 32 characters long"
            ));
        }

        if !self.database_url.starts_with("postgresql://")
            && !self.database_url.starts_with("postgres://")
        {
            return Err(anyhow::anyhow!(
                "DATABASE_URL must be a valid PostgreSQL connection string"
            ));
        }

        if self.email_enabled && (self.smtp_host.is_none() || self.smtp_from.is_none()) {
            return Err(anyhow::anyhow!(
                "EMAIL_ENABLED=true requires SMTP_HOST and SMTP_FROM to be set"
            ));
        }

        if self.analysis_max_concurrent_calls == 0 {
            return Err(anyhow::anyhow!(
                "ANALYSIS_MAX_CONCURRENT_CALLS must be at least 1"
            ));
        }

        if self.pipeline_keepalive_secs == 0 {
            return Err(anyhow::anyhow!("PIPELINE_KEEPALIVE_SECS must be at least 1"));
        }

        let backend = self.storage_backend.unwrap_or(StorageBackend::Local);
        match backend {
            StorageBackend::S3 => {
                if self.s3_bucket.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_BUCKET must be set when using S3 storage backend"
                    ));
                }
                if self.s3_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
                if self.local_storage_base_url.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_BASE_URL must be set when using local storage backend"
                    ));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ServiceConfig {
        ServiceConfig {
            base: BaseConfig {
                server_port: 4000,
                cors_origins: vec!["http://localhost:3000".to_string()],
                db_max_connections: 5,
                db_timeout_seconds: 5,
                jwt_secret: "a".repeat(32),
                session_expiry_hours: 24,
                sign_in_link_expiry_minutes: 30,
                environment: "development".to_string(),
            },
            database_url: "postgresql://localhost/logoscope".to_string(),
            storage_backend: Some(StorageBackend::Local),
            s3_bucket: None,
            s3_staging_bucket: None,
            s3_region: None,
            s3_endpoint: None,
            local_storage_path: Some("/tmp/logoscope".to_string()),
            local_storage_base_url: Some("http://localhost:4000/media".to_string()),
            max_file_size_bytes: 10 * 1024 * 1024,
            allowed_extensions: vec!["png".to_string()],
            allowed_content_types: vec!["image/png".to_string()],
            inline_asset_max_bytes: 1024,
            staging_ttl_hours: 24,
            staging_sweep_interval_secs: 0,
            free_tier_cooldown_hours: 24,
            stripe_secret_key: None,
            stripe_webhook_secret: None,
            stripe_api_base: "https://api.stripe.com".to_string(),
            payment_webhook_tolerance_secs: 300,
            anthropic_api_key: None,
            anthropic_api_base: "https://api.anthropic.com".to_string(),
            anthropic_vision_model: "vision".to_string(),
            anthropic_extraction_model: "extract".to_string(),
            analysis_call_timeout_secs: 90,
            analysis_max_concurrent_calls: 4,
            analysis_detail_description_chars: 2000,
            pipeline_keepalive_secs: 5,
            pipeline_stale_run_secs: 600,
            email_enabled: false,
            smtp_host: None,
            smtp_port: None,
            smtp_user: None,
            smtp_password: None,
            smtp_from: None,
            smtp_tls: true,
            frontend_url: "http://localhost:3000".to_string(),
        }
    }

    #[test]
    fn test_validate_accepts_local_config() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_short_jwt_secret() {
        let mut config = sample();
        config.base.jwt_secret = "short".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn test_validate_requires_smtp_when_email_enabled() {
        let mut config = sample();
        config.email_enabled = true;
        assert!(config.validate().is_err());
        config.smtp_host = Some("smtp.example.com".to_string());
        config.smtp_from = Some("noreply@example.com".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_requires_bucket_for_s3() {
        let mut config = sample();
        config.storage_backend = Some(StorageBackend::S3);
        assert!(config.validate().is_err());
        config.s3_bucket = Some("logos".to_string());
        config.s3_region = Some("us-east-1".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_is_production() {
        let mut config = sample();
        config.base.environment = "Production".to_string();
        assert!(Config(Box::new(config)).is_production());
    }
}
