//! Payment webhook event payloads (Stripe event wire format).

use logoscope_core::AppError;
use serde::Deserialize;
use std::collections::HashMap;

pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

#[derive(Debug, Deserialize)]
struct RawEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: RawEventData,
}

#[derive(Debug, Deserialize)]
struct RawEventData {
    object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct CheckoutObject {
    id: String,
    #[serde(default)]
    metadata: HashMap<String, String>,
    customer_email: Option<String>,
    customer_details: Option<CustomerDetails>,
    /// Either an id or an expanded object, depending on the API version
    payment_intent: Option<serde_json::Value>,
    amount_total: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct CustomerDetails {
    email: Option<String>,
    name: Option<String>,
}

/// A verified webhook delivery.
#[derive(Debug, Clone)]
pub struct PaymentEvent {
    pub id: String,
    pub event_type: String,
    object: serde_json::Value,
}

/// The fields of a completed checkout session the reconciliation reads. Correlation
/// metadata stays optional here so missing keys can be reported together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedCheckout {
    pub session_id: String,
    pub staging_id: Option<String>,
    pub tier: Option<String>,
    pub email: Option<String>,
    pub customer_name: Option<String>,
    pub payment_intent_id: Option<String>,
    pub amount_total_cents: Option<i64>,
}

impl PaymentEvent {
    pub fn parse(payload: &[u8]) -> Result<Self, AppError> {
        let raw: RawEvent = serde_json::from_slice(payload)?;
        Ok(Self {
            id: raw.id,
            event_type: raw.event_type,
            object: raw.data.object,
        })
    }

    pub fn is_checkout_completed(&self) -> bool {
        self.event_type == CHECKOUT_COMPLETED
    }

    /// Decode the session object. `None` for every other event type.
    pub fn completed_checkout(&self) -> Result<Option<CompletedCheckout>, AppError> {
        if !self.is_checkout_completed() {
            return Ok(None);
        }

        let object: CheckoutObject = serde_json::from_value(self.object.clone())?;
        let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

        let (details_email, customer_name) = match object.customer_details {
            Some(details) => (details.email, details.name),
            None => (None, None),
        };

        Ok(Some(CompletedCheckout {
            session_id: object.id,
            staging_id: non_empty(object.metadata.get("staging_id").cloned()),
            tier: non_empty(object.metadata.get("tier").cloned()),
            email: non_empty(details_email).or_else(|| non_empty(object.customer_email)),
            customer_name: non_empty(customer_name),
            payment_intent_id: object.payment_intent.and_then(|pi| match pi {
                serde_json::Value::String(id) => Some(id),
                other => other.get("id").and_then(|id| id.as_str()).map(String::from),
            }),
            amount_total_cents: object.amount_total,
        }))
    }
}
