use crate::error::ErrorResponse;
use axum::extract::{FromRequestParts, OptionalFromRequestParts};
use axum::http::{request::Parts, StatusCode};
use axum::Json;
use logoscope_core::Requester;
use std::convert::Infallible;
use uuid::Uuid;

/// The signed-in account, resolved from the bearer session token by the auth
/// middleware and stored in request extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountContext {
    pub account_id: Uuid,
    pub is_admin: bool,
}

impl AccountContext {
    pub fn requester(&self) -> Requester {
        Requester {
            account_id: self.account_id,
            is_admin: self.is_admin,
        }
    }
}

impl From<Requester> for AccountContext {
    fn from(requester: Requester) -> Self {
        Self {
            account_id: requester.account_id,
            is_admin: requester.is_admin,
        }
    }
}

// Extracted from parts rather than `Extension` so it composes with `Multipart`
impl<S> FromRequestParts<S> for AccountContext
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AccountContext>()
            .copied()
            .ok_or_else(|| {
                let mut body = ErrorResponse::new("Sign in required", "MISSING_ACCOUNT_CONTEXT");
                body.suggested_action =
                    Some("Send a session token as 'Authorization: Bearer <token>'".to_string());
                (StatusCode::UNAUTHORIZED, Json(body))
            })
    }
}

impl<S> OptionalFromRequestParts<S> for AccountContext
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<AccountContext>().copied())
    }
}
