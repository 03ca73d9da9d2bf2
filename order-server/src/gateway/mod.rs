//! Payment gateway seam
//!
//! [`PaymentGateway`] covers the intent lifecycle the order engine needs:
//! create, retrieve, refund, cancel, plus webhook verification. Adapters:
//! - [`stripe::StripeGateway`]: Stripe REST API over reqwest
//! - [`fake::FakeGateway`]: scripted in-process gateway for tests and local runs

pub mod fake;
pub mod stripe;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

/// Gateway-side state of a payment intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Canceled,
    Succeeded,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone)]
pub struct CreateIntent {
    pub amount_cents: i64,
    pub currency: String,
    /// Gateway-side dedupe key; retries with the same key return the same intent
    pub idempotency_key: Option<String>,
    pub metadata: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: Option<String>,
    pub status: IntentStatus,
    pub amount_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Refund {
    pub id: String,
}

/// Gateway call failure, classified by whether a retry can help
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("gateway request timed out")]
    Timeout,

    #[error("gateway unreachable: {0}")]
    Network(String),

    #[error("gateway returned {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("invalid gateway response: {0}")]
    InvalidResponse(String),
}

impl GatewayError {
    /// Timeouts, connection failures, 5xx and 429 are transient
    pub fn is_retryable(&self) -> bool {
        match self {
            GatewayError::Timeout | GatewayError::Network(_) => true,
            GatewayError::Upstream { status, .. } => *status >= 500 || *status == 429,
            GatewayError::InvalidResponse(_) => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WebhookError {
    #[error("missing signature header")]
    MissingSignature,

    #[error("malformed signature header")]
    MalformedHeader,

    #[error("signature mismatch")]
    SignatureMismatch,

    #[error("timestamp outside tolerance")]
    Stale,

    #[error("invalid event payload: {0}")]
    InvalidPayload(String),
}

/// What a verified webhook event means for an order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookKind {
    Succeeded,
    Failed,
    Canceled,
    Other,
}

impl WebhookKind {
    pub fn from_event_type(event_type: &str) -> Self {
        match event_type {
            "payment_intent.succeeded" => WebhookKind::Succeeded,
            "payment_intent.payment_failed" => WebhookKind::Failed,
            "payment_intent.canceled" => WebhookKind::Canceled,
            _ => WebhookKind::Other,
        }
    }
}

/// A verified webhook event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEvent {
    pub id: String,
    pub event_type: String,
    /// Payment intent the event refers to
    pub intent_id: Option<String>,
}

impl WebhookEvent {
    pub fn kind(&self) -> WebhookKind {
        WebhookKind::from_event_type(&self.event_type)
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_intent(&self, req: CreateIntent) -> Result<PaymentIntent, GatewayError>;

    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent, GatewayError>;

    /// Refund the full captured amount of an intent
    async fn refund(&self, intent_id: &str, reason: &str) -> Result<Refund, GatewayError>;

    async fn cancel_intent(&self, intent_id: &str) -> Result<(), GatewayError>;

    /// Authenticate a raw webhook body and decode it
    fn verify_webhook(&self, payload: &[u8], signature: &str) -> Result<WebhookEvent, WebhookError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(GatewayError::Timeout.is_retryable());
        assert!(GatewayError::Network("connection reset".into()).is_retryable());
        assert!(
            GatewayError::Upstream {
                status: 503,
                message: String::new()
            }
            .is_retryable()
        );
        assert!(
            GatewayError::Upstream {
                status: 429,
                message: String::new()
            }
            .is_retryable()
        );
        assert!(
            !GatewayError::Upstream {
                status: 402,
                message: "card_declined".into()
            }
            .is_retryable()
        );
        assert!(!GatewayError::InvalidResponse("no id".into()).is_retryable());
    }

    #[test]
    fn test_webhook_kind() {
        assert_eq!(
            WebhookKind::from_event_type("payment_intent.succeeded"),
            WebhookKind::Succeeded
        );
        assert_eq!(
            WebhookKind::from_event_type("payment_intent.payment_failed"),
            WebhookKind::Failed
        );
        assert_eq!(
            WebhookKind::from_event_type("payment_intent.canceled"),
            WebhookKind::Canceled
        );
        assert_eq!(
            WebhookKind::from_event_type("charge.refunded"),
            WebhookKind::Other
        );
    }

    #[test]
    fn test_intent_status_tolerates_new_values() {
        let status: IntentStatus = serde_json::from_str("\"succeeded\"").unwrap();
        assert_eq!(status, IntentStatus::Succeeded);
        let status: IntentStatus = serde_json::from_str("\"something_new\"").unwrap();
        assert_eq!(status, IntentStatus::Unknown);
    }
}
