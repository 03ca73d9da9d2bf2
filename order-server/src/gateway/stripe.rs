//! Stripe adapter via REST API (no SDK dependency)

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use std::time::Duration;

use super::{
    CreateIntent, GatewayError, IntentStatus, PaymentGateway, PaymentIntent, Refund,
    WebhookError, WebhookEvent,
};

/// Accepted clock skew for webhook timestamps
const WEBHOOK_TOLERANCE_SECS: i64 = 300;

pub struct StripeGateway {
    client: reqwest::Client,
    secret_key: String,
    webhook_secret: String,
    api_base: String,
}

impl StripeGateway {
    pub fn new(
        secret_key: impl Into<String>,
        webhook_secret: impl Into<String>,
        api_base: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Network(e.to_string()))?;
        Ok(Self {
            client,
            secret_key: secret_key.into(),
            webhook_secret: webhook_secret.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
        })
    }

    async fn post_form(
        &self,
        path: &str,
        form: &[(String, String)],
        idempotency_key: Option<&str>,
    ) -> Result<Value, GatewayError> {
        let mut req = self
            .client
            .post(format!("{}{path}", self.api_base))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(form);
        if let Some(key) = idempotency_key {
            req = req.header("Idempotency-Key", key);
        }
        read_response(req.send().await.map_err(classify)?).await
    }

    async fn get(&self, path: &str) -> Result<Value, GatewayError> {
        let resp = self
            .client
            .get(format!("{}{path}", self.api_base))
            .basic_auth(&self.secret_key, None::<&str>)
            .send()
            .await
            .map_err(classify)?;
        read_response(resp).await
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_intent(&self, req: CreateIntent) -> Result<PaymentIntent, GatewayError> {
        let mut form = vec![
            ("amount".to_string(), req.amount_cents.to_string()),
            ("currency".to_string(), req.currency),
            (
                "automatic_payment_methods[enabled]".to_string(),
                "true".to_string(),
            ),
        ];
        form.extend(
            req.metadata
                .into_iter()
                .map(|(k, v)| (format!("metadata[{k}]"), v)),
        );
        let body = self
            .post_form("/v1/payment_intents", &form, req.idempotency_key.as_deref())
            .await?;
        parse_intent(&body)
    }

    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent, GatewayError> {
        let body = self.get(&format!("/v1/payment_intents/{intent_id}")).await?;
        parse_intent(&body)
    }

    async fn refund(&self, intent_id: &str, reason: &str) -> Result<Refund, GatewayError> {
        let form = vec![
            ("payment_intent".to_string(), intent_id.to_string()),
            ("reason".to_string(), "requested_by_customer".to_string()),
            ("metadata[reason]".to_string(), reason.to_string()),
        ];
        let idempotency_key = format!("refund-{intent_id}");
        let body = self
            .post_form("/v1/refunds", &form, Some(&idempotency_key))
            .await?;
        body["id"]
            .as_str()
            .map(|id| Refund { id: id.to_string() })
            .ok_or_else(|| GatewayError::InvalidResponse(format!("refund without id: {body}")))
    }

    async fn cancel_intent(&self, intent_id: &str) -> Result<(), GatewayError> {
        self.post_form(&format!("/v1/payment_intents/{intent_id}/cancel"), &[], None)
            .await?;
        Ok(())
    }

    fn verify_webhook(&self, payload: &[u8], signature: &str) -> Result<WebhookEvent, WebhookError> {
        verify_webhook_signature(
            payload,
            signature,
            &self.webhook_secret,
            chrono::Utc::now().timestamp(),
        )?;
        parse_event(payload)
    }
}

fn classify(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Timeout
    } else {
        GatewayError::Network(err.to_string())
    }
}

async fn read_response(resp: reqwest::Response) -> Result<Value, GatewayError> {
    let status = resp.status();
    let text = resp.text().await.map_err(classify)?;

    if !status.is_success() {
        let message = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|v| v["error"]["message"].as_str().map(String::from))
            .unwrap_or(text);
        return Err(GatewayError::Upstream {
            status: status.as_u16(),
            message,
        });
    }

    serde_json::from_str(&text).map_err(|e| GatewayError::InvalidResponse(e.to_string()))
}

fn parse_intent(body: &Value) -> Result<PaymentIntent, GatewayError> {
    let id = body["id"]
        .as_str()
        .ok_or_else(|| GatewayError::InvalidResponse(format!("intent without id: {body}")))?;
    let amount_cents = body["amount"]
        .as_i64()
        .ok_or_else(|| GatewayError::InvalidResponse(format!("intent without amount: {body}")))?;
    let status = serde_json::from_value(body["status"].clone()).unwrap_or(IntentStatus::Unknown);

    Ok(PaymentIntent {
        id: id.to_string(),
        client_secret: body["client_secret"].as_str().map(String::from),
        status,
        amount_cents,
    })
}

/// Verify a `Stripe-Signature` header (HMAC-SHA256 over `"{t}.{payload}"`)
pub fn verify_webhook_signature(
    payload: &[u8],
    sig_header: &str,
    secret: &str,
    now_secs: i64,
) -> Result<(), WebhookError> {
    let mut timestamp = "";
    let mut signatures = Vec::new();
    for part in sig_header.split(',') {
        let part = part.trim();
        if let Some(t) = part.strip_prefix("t=") {
            timestamp = t;
        } else if let Some(v) = part.strip_prefix("v1=") {
            signatures.push(v);
        }
    }
    if timestamp.is_empty() || signatures.is_empty() {
        return Err(WebhookError::MalformedHeader);
    }

    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).map_err(|_| WebhookError::SignatureMismatch)?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);

    // Any v1 entry may match (Stripe sends several while rolling secrets)
    let matched = signatures.iter().any(|sig| {
        hex::decode(sig)
            .map(|bytes| mac.clone().verify_slice(&bytes).is_ok())
            .unwrap_or(false)
    });
    if !matched {
        return Err(WebhookError::SignatureMismatch);
    }

    let ts: i64 = timestamp.parse().map_err(|_| WebhookError::MalformedHeader)?;
    if (now_secs - ts).abs() > WEBHOOK_TOLERANCE_SECS {
        return Err(WebhookError::Stale);
    }
    Ok(())
}

/// Build a `Stripe-Signature` header for `payload`
pub fn sign_payload(payload: &[u8], secret: &str, timestamp: i64) -> String {
    // new_from_slice accepts keys of any length for HMAC
    let mut mac = match Hmac::<Sha256>::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return format!("t={timestamp}"),
    };
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    format!(
        "t={timestamp},v1={}",
        hex::encode(mac.finalize().into_bytes())
    )
}

/// Decode the event envelope. Only the fields the engine acts on are kept.
pub fn parse_event(payload: &[u8]) -> Result<WebhookEvent, WebhookError> {
    let event: Value = serde_json::from_slice(payload)
        .map_err(|e| WebhookError::InvalidPayload(e.to_string()))?;

    let event_type = event["type"]
        .as_str()
        .ok_or_else(|| WebhookError::InvalidPayload("missing type".to_string()))?;
    let object = &event["data"]["object"];
    let intent_id = match object["object"].as_str() {
        Some("payment_intent") | None => object["id"].as_str().map(String::from),
        Some(_) => object["payment_intent"].as_str().map(String::from),
    };

    Ok(WebhookEvent {
        id: event["id"].as_str().unwrap_or_default().to_string(),
        event_type: event_type.to_string(),
        intent_id,
    })
}
