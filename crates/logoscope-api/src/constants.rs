//! API-wide constants.

/// Current API version segment.
pub const API_VERSION: &str = "v0";

/// Prefix every versioned route is nested under.
pub const API_PREFIX: &str = "/api/v0";

/// Lifetime of presigned asset URLs handed out in analysis views.
pub const ASSET_URL_TTL_SECS: u64 = 3600;

/// Timeout for calls to the payment provider's API.
pub const PAYMENT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Header carrying the payment provider's webhook signature.
pub const PAYMENT_SIGNATURE_HEADER: &str = "Stripe-Signature";

/// Multipart framing allowance on top of the maximum logo size.
pub const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

pub const DEFAULT_MODERATION_LIMIT: i64 = 50;
pub const MAX_MODERATION_LIMIT: i64 = 200;
