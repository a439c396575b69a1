//! Payment gateway integration
//!
//! The [`PaymentGateway`] trait is the seam between the order core and the
//! external checkout provider. Production uses the REST adapter in
//! [`http`]; tests substitute an in-process double.
//!
//! Webhook notifications are only hints: [`GatewayEvent`] extracts the
//! payment id and everything else is re-fetched from the gateway, which is
//! the authoritative source for payment state.

pub mod http;
pub mod retry;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::error::AppResult;
use std::collections::HashMap;

pub use http::HttpPaymentGateway;
pub use retry::RetryPolicy;

/// Metadata key carrying our order id through the gateway round-trip
pub const METADATA_ORDER_ID: &str = "order_id";

/// One line in a payment preference
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PreferenceItem {
    pub title: String,
    pub quantity: i32,
    pub currency_id: String,
    pub unit_price: f64,
}

/// Redirect targets the checkout page sends the buyer back to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackUrls {
    pub success: String,
    pub failure: String,
    pub pending: String,
}

/// Request body for creating a payment preference
#[derive(Debug, Clone, Serialize)]
pub struct PreferenceRequest {
    pub items: Vec<PreferenceItem>,
    pub back_urls: BackUrls,
    pub notification_url: String,
    /// Round-trips opaquely through the gateway; carries the order id
    pub metadata: HashMap<String, serde_json::Value>,
}

/// A created payment preference
#[derive(Debug, Clone, Deserialize)]
pub struct Preference {
    pub id: String,
    /// Checkout URL the buyer is redirected to
    pub init_point: String,
}

/// Authoritative payment resource fetched from the gateway
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayPayment {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub status_detail: String,
    pub transaction_amount: f64,
    pub currency_id: String,
    #[serde(default)]
    pub payment_type_id: String,
    #[serde(default)]
    pub authorization_code: Option<String>,
    #[serde(default)]
    pub date_created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl GatewayPayment {
    /// The order id this payment settles, from round-tripped metadata.
    /// Accepts both string and numeric encodings.
    pub fn order_id(&self) -> Option<String> {
        self.metadata.get(METADATA_ORDER_ID).and_then(value_as_id)
    }
}

/// Payment gateway port
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a checkout preference for an order
    async fn create_preference(&self, request: &PreferenceRequest) -> AppResult<Preference>;

    /// Fetch the authoritative payment resource by gateway payment id
    async fn get_payment(&self, payment_id: &str) -> AppResult<GatewayPayment>;
}

/// Parsed webhook notification
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayEvent {
    /// A payment-type event referencing a gateway payment id
    Payment { payment_id: String },
    /// Anything else the gateway may send (merchant orders, test pings, ...)
    Unknown,
}

impl GatewayEvent {
    /// Lenient parse of a webhook body.
    ///
    /// The gateway sends `{"type": "payment", "data": {"id": ...}}` where the
    /// id shows up either as a string or a bare number depending on the
    /// notification channel. Older notifications use `topic` instead of
    /// `type`. Everything unrecognized maps to [`GatewayEvent::Unknown`] so
    /// the webhook endpoint can acknowledge it without processing.
    pub fn parse(body: &serde_json::Value) -> Self {
        let kind = body
            .get("type")
            .or_else(|| body.get("topic"))
            .and_then(|v| v.as_str());
        if kind != Some("payment") {
            return GatewayEvent::Unknown;
        }

        match body.get("data").and_then(|d| d.get("id")).and_then(value_as_id) {
            Some(payment_id) => GatewayEvent::Payment { payment_id },
            None => GatewayEvent::Unknown,
        }
    }
}

/// Render a JSON string or number as an id string
fn value_as_id(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Payment ids arrive as JSON numbers; normalize to a string
fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    value_as_id(&value).ok_or_else(|| serde::de::Error::custom("invalid payment id"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_payment_event_with_string_id() {
        let body = json!({"type": "payment", "data": {"id": "12345"}});
        assert_eq!(
            GatewayEvent::parse(&body),
            GatewayEvent::Payment {
                payment_id: "12345".to_string()
            }
        );
    }

    #[test]
    fn test_parse_payment_event_with_numeric_id() {
        let body = json!({"type": "payment", "data": {"id": 12345}});
        assert_eq!(
            GatewayEvent::parse(&body),
            GatewayEvent::Payment {
                payment_id: "12345".to_string()
            }
        );
    }

    #[test]
    fn test_parse_topic_variant() {
        let body = json!({"topic": "payment", "data": {"id": "9"}});
        assert_eq!(
            GatewayEvent::parse(&body),
            GatewayEvent::Payment {
                payment_id: "9".to_string()
            }
        );
    }

    #[test]
    fn test_parse_non_payment_event() {
        let body = json!({"type": "merchant_order", "data": {"id": "555"}});
        assert_eq!(GatewayEvent::parse(&body), GatewayEvent::Unknown);
    }

    #[test]
    fn test_parse_malformed_bodies() {
        assert_eq!(GatewayEvent::parse(&json!({})), GatewayEvent::Unknown);
        assert_eq!(
            GatewayEvent::parse(&json!({"type": "payment"})),
            GatewayEvent::Unknown
        );
        assert_eq!(
            GatewayEvent::parse(&json!({"type": "payment", "data": {"id": null}})),
            GatewayEvent::Unknown
        );
        assert_eq!(
            GatewayEvent::parse(&json!({"type": "payment", "data": {"id": ""}})),
            GatewayEvent::Unknown
        );
    }

    #[test]
    fn test_gateway_payment_deserializes_numeric_id() {
        let payment: GatewayPayment = serde_json::from_value(json!({
            "id": 987654,
            "status": "approved",
            "status_detail": "accredited",
            "transaction_amount": 2500.0,
            "currency_id": "COP",
            "payment_type_id": "credit_card",
            "authorization_code": "AUTH9",
            "date_created": "2026-08-01T10:00:00Z",
            "metadata": {"order_id": "ord-1"}
        }))
        .unwrap();

        assert_eq!(payment.id, "987654");
        assert_eq!(payment.order_id(), Some("ord-1".to_string()));
    }

    #[test]
    fn test_order_id_numeric_metadata() {
        let payment: GatewayPayment = serde_json::from_value(json!({
            "id": "1",
            "status": "approved",
            "transaction_amount": 10.0,
            "currency_id": "COP",
            "metadata": {"order_id": 42}
        }))
        .unwrap();
        assert_eq!(payment.order_id(), Some("42".to_string()));
    }

    #[test]
    fn test_order_id_missing_metadata() {
        let payment: GatewayPayment = serde_json::from_value(json!({
            "id": "1",
            "status": "approved",
            "transaction_amount": 10.0,
            "currency_id": "COP"
        }))
        .unwrap();
        assert_eq!(payment.order_id(), None);
    }
}
