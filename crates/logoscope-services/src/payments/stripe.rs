//! Checkout sessions over the Stripe REST API

use anyhow::Context;
use async_trait::async_trait;
use logoscope_core::AppError;
use serde::Deserialize;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::time::Duration;

use super::{CheckoutSession, CheckoutSessionRequest, PaymentGateway};

const SERVICE: &str = "payments";

pub struct StripeGateway {
    http_client: reqwest::Client,
    api_base: String,
    secret_key: String,
}

impl Debug for StripeGateway {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("StripeGateway")
            .field("api_base", &self.api_base)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: String,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl StripeGateway {
    pub fn new(api_base: &str, secret_key: &str, timeout: Duration) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client for payments")?;

        Ok(Self {
            http_client,
            api_base: api_base.trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
        })
    }

    fn form_params(request: &CheckoutSessionRequest) -> Vec<(&'static str, String)> {
        let staging_id = request.staging_id.to_string();
        vec![
            ("mode", "payment".to_string()),
            ("success_url", request.success_url.clone()),
            ("cancel_url", request.cancel_url.clone()),
            ("customer_email", request.email.clone()),
            ("client_reference_id", staging_id.clone()),
            ("metadata[staging_id]", staging_id.clone()),
            ("metadata[tier]", request.tier.as_str().to_string()),
            ("payment_intent_data[metadata][staging_id]", staging_id),
            ("line_items[0][quantity]", "1".to_string()),
            ("line_items[0][price_data][currency]", request.currency.clone()),
            (
                "line_items[0][price_data][unit_amount]",
                request.amount_cents.to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]",
                request.product_name.clone(),
            ),
        ]
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    #[tracing::instrument(skip(self, request), fields(staging_id = %request.staging_id, tier = %request.tier))]
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, AppError> {
        let response = self
            .http_client
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .bearer_auth(&self.secret_key)
            .header("Idempotency-Key", request.idempotency_key())
            .form(&Self::form_params(request))
            .send()
            .await
            .map_err(|e| AppError::external(SERVICE, format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .ok()
                .and_then(|envelope| envelope.error.message)
                .unwrap_or(body);
            return Err(AppError::external(
                SERVICE,
                format!("Checkout session request failed: {} - {}", status, message),
            ));
        }

        let session: SessionResponse = response.json().await.map_err(|e| {
            AppError::external(SERVICE, format!("Failed to parse checkout session: {}", e))
        })?;
        let url = session.url.ok_or_else(|| {
            AppError::external(SERVICE, "Checkout session has no redirect URL")
        })?;

        tracing::info!(session_id = %session.id, "Checkout session created");

        Ok(CheckoutSession {
            id: session.id,
            url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logoscope_core::Tier;
    use mockito::Matcher;
    use uuid::Uuid;

    fn request(staging_id: Uuid) -> CheckoutSessionRequest {
        CheckoutSessionRequest {
            staging_id,
            tier: Tier::Premium,
            email: "buyer@example.com".to_string(),
            amount_cents: 4900,
            currency: "usd".to_string(),
            product_name: "Brand system deep dive".to_string(),
            success_url: "http://localhost:3000/checkout/success".to_string(),
            cancel_url: "http://localhost:3000/checkout/cancel".to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_checkout_session_sends_correlation_metadata() {
        let mut server = mockito::Server::new_async().await;
        let staging_id = Uuid::new_v4();
        let mock = server
            .mock("POST", "/v1/checkout/sessions")
            .match_header("authorization", "Bearer sk_test_123")
            .match_header(
                "idempotency-key",
                format!("{}:premium", staging_id).as_str(),
            )
            .match_body(Matcher::AllOf(vec![
                Matcher::UrlEncoded("metadata[staging_id]".into(), staging_id.to_string()),
                Matcher::UrlEncoded("metadata[tier]".into(), "premium".into()),
                Matcher::UrlEncoded(
                    "line_items[0][price_data][unit_amount]".into(),
                    "4900".into(),
                ),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":"cs_test_1","url":"https://pay.example/cs_test_1"}"#)
            .create_async()
            .await;

        let gateway =
            StripeGateway::new(&server.url(), "sk_test_123", Duration::from_secs(5)).unwrap();
        let session = gateway
            .create_checkout_session(&request(staging_id))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(session.id, "cs_test_1");
        assert_eq!(session.url, "https://pay.example/cs_test_1");
    }

    #[tokio::test]
    async fn test_provider_error_is_external() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/checkout/sessions")
            .with_status(402)
            .with_body(r#"{"error":{"message":"Your card was declined"}}"#)
            .create_async()
            .await;

        let gateway =
            StripeGateway::new(&server.url(), "sk_test_123", Duration::from_secs(5)).unwrap();
        let err = gateway
            .create_checkout_session(&request(Uuid::new_v4()))
            .await
            .unwrap_err();

        match err {
            AppError::ExternalService { service, message } => {
                assert_eq!(service, "payments");
                assert!(message.contains("declined"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
