pub mod admin;
pub mod analyses;
pub mod auth;
pub mod checkout;
pub mod curation;
pub mod health;
pub mod share;
pub mod stream;
pub mod submissions;
pub mod webhooks;

use axum::http::header;
use logoscope_core::{AppError, Tier};
use logoscope_services::CachePolicy;

/// `Cache-Control` header pair for a projection.
pub(crate) fn cache_control(policy: CachePolicy) -> [(header::HeaderName, &'static str); 1] {
    [(header::CACHE_CONTROL, policy.header_value())]
}

/// Cache headers for a projection that depends on who is asking. `Vary` keeps shared
/// caches from handing an owner's view to anonymous readers and the reverse.
pub(crate) fn viewer_cache_headers(
    policy: CachePolicy,
) -> [(header::HeaderName, &'static str); 2] {
    let [cache_control] = cache_control(policy);
    [cache_control, (header::VARY, "authorization")]
}

/// Parse a tier name from a request, reporting unknown names as an invalid tier.
pub(crate) fn parse_tier(raw: &str) -> Result<Tier, AppError> {
    raw.parse::<Tier>()
        .map_err(|_| AppError::InvalidTier(format!("Unknown tier '{}'", raw.trim())))
}
