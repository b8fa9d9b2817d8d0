//! Error types module
//!
//! All failures surfaced by Logoscope services are unified under the `AppError` enum.
//! Each variant self-describes its HTTP presentation through `ErrorMetadata`, so the API
//! layer only has to render what the error already knows about itself.
//!
//! The `Database` variant and `From<sqlx::Error>` are gated behind the `sqlx` feature.

use std::io;

#[cfg(feature = "sqlx")]
use sqlx::Error as SqlxError;
use uuid::Uuid;

/// Severity an error is logged at when it reaches the HTTP boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Caller mistakes: bad input, missing auth, limits.
    Debug,
    /// Worth noticing but not ours to fix, such as upstream hiccups and forged webhooks.
    Warn,
    Error,
}

/// How an error presents itself to clients.
pub trait ErrorMetadata {
    fn http_status_code(&self) -> u16;

    /// Stable machine-readable code, e.g. `FREE_TIER_LIMIT`.
    fn error_code(&self) -> &'static str;

    /// Whether retrying the same request may succeed.
    fn is_recoverable(&self) -> bool;

    fn suggested_action(&self) -> Option<&'static str>;

    /// Message safe to show the caller; internal detail stays in `Display`.
    fn client_message(&self) -> String;

    /// Sensitive errors never expose details or the cause chain.
    fn is_sensitive(&self) -> bool;

    fn log_level(&self) -> LogLevel;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[source] SqlxError),

    #[cfg(not(feature = "sqlx"))]
    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("File too large: {0}")]
    PayloadTooLarge(String),

    #[error("Invalid tier: {0}")]
    InvalidTier(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Tier not eligible: {0}")]
    TierNotEligible(String),

    #[error("Free analysis limit reached: {0}")]
    FreeTierLimit(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Analysis {0} is already being processed")]
    AlreadyProcessing(Uuid),

    #[error("Invalid webhook signature: {0}")]
    InvalidSignature(String),

    #[error("Missing event metadata: {}", .0.join(", "))]
    MissingMetadata(Vec<&'static str>),

    #[error("{service} error: {message}")]
    ExternalService {
        service: &'static str,
        message: String,
    },

    #[error("Schema validation failed for {section}: {message}")]
    SchemaValidation { section: String, message: String },

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

#[cfg(feature = "sqlx")]
impl From<SqlxError> for AppError {
    fn from(err: SqlxError) -> Self {
        AppError::Database(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Validation(format!("JSON parsing error: {}", err))
    }
}

impl From<uuid::Error> for AppError {
    fn from(err: uuid::Error) -> Self {
        AppError::Validation(format!("UUID parsing error: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(format!("Validation error: {}", err))
    }
}

#[derive(Debug, Clone, Copy)]
struct Presentation {
    status: u16,
    code: &'static str,
    recoverable: bool,
    action: Option<&'static str>,
    sensitive: bool,
    level: LogLevel,
}

impl Presentation {
    const fn caller(status: u16, code: &'static str, action: Option<&'static str>) -> Self {
        Self {
            status,
            code,
            recoverable: false,
            action,
            sensitive: false,
            level: LogLevel::Debug,
        }
    }

    const fn fault(status: u16, code: &'static str, action: &'static str, level: LogLevel) -> Self {
        Self {
            status,
            code,
            recoverable: true,
            action: Some(action),
            sensitive: true,
            level,
        }
    }

    const fn warn(self) -> Self {
        Self {
            level: LogLevel::Warn,
            ..self
        }
    }
}

const RETRY_LATER: &str = "Retry after a short delay";

impl AppError {
    fn presentation(&self) -> Presentation {
        use Presentation as P;
        match self {
            AppError::Database(_) => P::fault(500, "DATABASE_ERROR", RETRY_LATER, LogLevel::Error),
            AppError::Storage(_) => P::fault(500, "STORAGE_ERROR", RETRY_LATER, LogLevel::Error),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                P::fault(500, "INTERNAL_ERROR", RETRY_LATER, LogLevel::Error)
            }
            AppError::ExternalService { .. } => {
                P::fault(502, "EXTERNAL_SERVICE_ERROR", RETRY_LATER, LogLevel::Warn)
            }
            AppError::SchemaValidation { .. } => {
                P::fault(502, "SCHEMA_VALIDATION_ERROR", "Restart the analysis", LogLevel::Warn)
            }
            AppError::Validation(_) => P::caller(
                400,
                "VALIDATION_ERROR",
                Some("Check request parameters and try again"),
            ),
            AppError::PayloadTooLarge(_) => {
                P::caller(413, "PAYLOAD_TOO_LARGE", Some("Upload a smaller image"))
            }
            AppError::InvalidTier(_) => P::caller(400, "INVALID_TIER", Some("Choose a payable tier")),
            AppError::Unauthorized(_) => P::caller(
                401,
                "UNAUTHORIZED",
                Some("Sign in and retry with a valid session token"),
            ),
            AppError::Forbidden(_) => P::caller(
                403,
                "FORBIDDEN",
                Some("Only the owner or an administrator can access this resource"),
            ),
            AppError::TierNotEligible(_) => P::caller(
                403,
                "TIER_NOT_ELIGIBLE",
                Some("Upgrade to a paid tier to use this feature"),
            ),
            AppError::FreeTierLimit(_) => P::caller(
                429,
                "FREE_TIER_LIMIT",
                Some("Wait 24 hours or choose a paid tier"),
            ),
            AppError::NotFound(_) => {
                P::caller(404, "NOT_FOUND", Some("Verify the resource ID exists"))
            }
            AppError::AlreadyProcessing(_) => P::caller(
                409,
                "ALREADY_PROCESSING",
                Some("Wait for the current run to finish"),
            ),
            AppError::InvalidSignature(_) => P::caller(400, "INVALID_SIGNATURE", None).warn(),
            AppError::MissingMetadata(_) => P::caller(400, "MISSING_METADATA", None).warn(),
        }
    }

    /// Shorthand for an upstream failure from a named collaborator.
    pub fn external(service: &'static str, message: impl Into<String>) -> Self {
        AppError::ExternalService {
            service,
            message: message.into(),
        }
    }

    /// Variant name, shown alongside details outside production.
    pub fn error_type(&self) -> &str {
        match self {
            AppError::Database(_) => "Database",
            AppError::Storage(_) => "Storage",
            AppError::Validation(_) => "Validation",
            AppError::PayloadTooLarge(_) => "PayloadTooLarge",
            AppError::InvalidTier(_) => "InvalidTier",
            AppError::Unauthorized(_) => "Unauthorized",
            AppError::Forbidden(_) => "Forbidden",
            AppError::TierNotEligible(_) => "TierNotEligible",
            AppError::FreeTierLimit(_) => "FreeTierLimit",
            AppError::NotFound(_) => "NotFound",
            AppError::AlreadyProcessing(_) => "AlreadyProcessing",
            AppError::InvalidSignature(_) => "InvalidSignature",
            AppError::MissingMetadata(_) => "MissingMetadata",
            AppError::ExternalService { .. } => "ExternalService",
            AppError::SchemaValidation { .. } => "SchemaValidation",
            AppError::Internal(_) | AppError::InternalWithSource { .. } => "Internal",
        }
    }

    /// Display text followed by up to five levels of causes.
    pub fn detailed_message(&self) -> String {
        const MAX_DEPTH: usize = 5;
        let mut chain = std::iter::successors(std::error::Error::source(self), |err| err.source());

        let mut details = self.to_string();
        for cause in chain.by_ref().take(MAX_DEPTH) {
            details.push_str("\n  Caused by: ");
            details.push_str(&cause.to_string());
        }
        if chain.next().is_some() {
            details.push_str("\n  ... (truncated)");
        }
        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        self.presentation().status
    }

    fn error_code(&self) -> &'static str {
        self.presentation().code
    }

    fn is_recoverable(&self) -> bool {
        self.presentation().recoverable
    }

    fn suggested_action(&self) -> Option<&'static str> {
        self.presentation().action
    }

    fn is_sensitive(&self) -> bool {
        self.presentation().sensitive
    }

    fn log_level(&self) -> LogLevel {
        self.presentation().level
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Database(_) => "Failed to access database".to_string(),
            AppError::Storage(_) => "Failed to access storage".to_string(),
            AppError::Validation(ref msg)
            | AppError::PayloadTooLarge(ref msg)
            | AppError::InvalidTier(ref msg)
            | AppError::Unauthorized(ref msg)
            | AppError::Forbidden(ref msg)
            | AppError::TierNotEligible(ref msg)
            | AppError::FreeTierLimit(ref msg)
            | AppError::NotFound(ref msg)
            | AppError::InvalidSignature(ref msg) => msg.clone(),
            AppError::AlreadyProcessing(id) => {
                format!("Analysis {} is already being processed", id)
            }
            AppError::MissingMetadata(fields) => {
                format!("Event is missing metadata: {}", fields.join(", "))
            }
            AppError::ExternalService { service, .. } => {
                format!("Upstream service {} failed", service)
            }
            AppError::SchemaValidation { section, .. } => {
                format!("Generated {} section was malformed", section)
            }
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal server error".to_string()
            }
        }
    }
}
