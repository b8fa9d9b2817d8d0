use crate::constants::PAYMENT_SIGNATURE_HEADER;
use crate::error::{ErrorResponse, HttpAppError};
use crate::state::PaymentState;
use axum::{body::Bytes, extract::State, http::HeaderMap, response::IntoResponse, Json};

/// Payment provider webhook
///
/// The raw body is verified against the signature header before anything is parsed.
/// Any 2xx acknowledges the delivery; errors make the provider redeliver.
#[utoipa::path(
    post,
    path = "/api/v0/webhooks/payments",
    tag = "payments",
    request_body(content = inline(Object), content_type = "application/json"),
    params(("Stripe-Signature" = String, Header, description = "Provider signature header")),
    responses(
        (status = 200, description = "Delivery handled or safely ignored"),
        (status = 400, description = "Invalid signature", body = ErrorResponse),
        (status = 500, description = "Transient failure; the provider will redeliver", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(payments, headers, body), fields(size = body.len(), operation = "payment_webhook"))]
pub async fn payment_webhook(
    State(payments): State<PaymentState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, HttpAppError> {
    let signature = headers
        .get(PAYMENT_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let outcome = payments.reconciliation.handle(&body, signature).await?;
    tracing::info!(outcome = ?outcome, "Payment webhook handled");

    Ok(Json(outcome))
}
