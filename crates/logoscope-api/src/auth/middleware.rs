use crate::auth::models::AccountContext;
use crate::error::HttpAppError;
use crate::state::AuthState;
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use logoscope_core::AppError;

/// `None` when no Authorization header was sent; an error when one was sent but is
/// not a bearer token.
fn bearer_token(headers: &HeaderMap) -> Result<Option<&str>, AppError> {
    let Some(value) = headers.get("Authorization") else {
        return Ok(None);
    };

    let value = value
        .to_str()
        .map_err(|_| AppError::Unauthorized("Invalid authorization header".to_string()))?;
    match value.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(Some(token.trim())),
        _ => Err(AppError::Unauthorized(
            "Invalid authorization header format".to_string(),
        )),
    }
}

async fn resolve(auth_state: &AuthState, headers: &HeaderMap) -> Result<Option<AccountContext>, AppError> {
    match bearer_token(headers)? {
        Some(token) => {
            let requester = auth_state.auth.authenticate(token).await?;
            Ok(Some(requester.into()))
        }
        None => Ok(None),
    }
}

/// Require a valid session token.
pub async fn auth_middleware(
    State(auth_state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Response {
    match resolve(&auth_state, request.headers()).await {
        Ok(Some(context)) => {
            tracing::debug!(account_id = %context.account_id, "Request authenticated");
            request.extensions_mut().insert(context);
            next.run(request).await
        }
        Ok(None) => HttpAppError(AppError::Unauthorized(
            "Missing authorization header".to_string(),
        ))
        .into_response(),
        Err(e) => HttpAppError(e).into_response(),
    }
}

/// Attach the account when a session token is sent. Anonymous requests pass through;
/// a token that is sent but invalid is still rejected.
pub async fn optional_auth_middleware(
    State(auth_state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Response {
    match resolve(&auth_state, request.headers()).await {
        Ok(Some(context)) => {
            request.extensions_mut().insert(context);
            next.run(request).await
        }
        Ok(None) => next.run(request).await,
        Err(e) => HttpAppError(e).into_response(),
    }
}
