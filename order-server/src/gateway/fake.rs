//! Scripted in-process gateway
//!
//! Intents live in memory; tests flip their status, inject failures and
//! inspect refunds. Webhooks use the same signature scheme as Stripe.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

use super::stripe::{parse_event, sign_payload, verify_webhook_signature};
use super::{
    CreateIntent, GatewayError, IntentStatus, PaymentGateway, PaymentIntent, Refund,
    WebhookError, WebhookEvent,
};

#[derive(Default)]
struct FakeState {
    intents: HashMap<String, PaymentIntent>,
    /// Gateway-side idempotency: key -> intent id
    idempotency: HashMap<String, String>,
    next_id: u64,
    refunds: Vec<(String, String)>,
    cancelled: Vec<String>,
    fail_create: Option<GatewayError>,
    fail_refund: Option<GatewayError>,
}

pub struct FakeGateway {
    webhook_secret: String,
    state: Mutex<FakeState>,
}

impl FakeGateway {
    pub fn new(webhook_secret: impl Into<String>) -> Self {
        Self {
            webhook_secret: webhook_secret.into(),
            state: Mutex::new(FakeState::default()),
        }
    }

    /// Make every `create_intent` fail with `err` until cleared
    pub fn fail_create_with(&self, err: Option<GatewayError>) {
        self.state.lock().fail_create = err;
    }

    /// Make every `refund` fail with `err` until cleared
    pub fn fail_refund_with(&self, err: Option<GatewayError>) {
        self.state.lock().fail_refund = err;
    }

    pub fn set_status(&self, intent_id: &str, status: IntentStatus) {
        if let Some(intent) = self.state.lock().intents.get_mut(intent_id) {
            intent.status = status;
        }
    }

    pub fn set_amount(&self, intent_id: &str, amount_cents: i64) {
        if let Some(intent) = self.state.lock().intents.get_mut(intent_id) {
            intent.amount_cents = amount_cents;
        }
    }

    pub fn intent(&self, intent_id: &str) -> Option<PaymentIntent> {
        self.state.lock().intents.get(intent_id).cloned()
    }

    pub fn intent_count(&self) -> usize {
        self.state.lock().intents.len()
    }

    /// Refunds issued so far as `(intent_id, reason)`
    pub fn refunds(&self) -> Vec<(String, String)> {
        self.state.lock().refunds.clone()
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.state.lock().cancelled.clone()
    }

    /// Signed webhook body + header for an intent event
    pub fn signed_event(&self, event_type: &str, intent_id: &str) -> (Vec<u8>, String) {
        let payload = serde_json::json!({
            "id": format!("evt_{intent_id}_{event_type}"),
            "type": event_type,
            "data": { "object": { "id": intent_id, "object": "payment_intent" } }
        })
        .to_string()
        .into_bytes();
        let header = sign_payload(&payload, &self.webhook_secret, chrono::Utc::now().timestamp());
        (payload, header)
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_intent(&self, req: CreateIntent) -> Result<PaymentIntent, GatewayError> {
        let mut state = self.state.lock();
        if let Some(err) = state.fail_create.clone() {
            return Err(err);
        }
        if let Some(key) = &req.idempotency_key
            && let Some(existing) = state
                .idempotency
                .get(key)
                .and_then(|id| state.intents.get(id))
        {
            return Ok(existing.clone());
        }

        state.next_id += 1;
        let id = format!("pi_fake_{}", state.next_id);
        let intent = PaymentIntent {
            client_secret: Some(format!("{id}_secret")),
            id: id.clone(),
            status: IntentStatus::RequiresPaymentMethod,
            amount_cents: req.amount_cents,
        };
        if let Some(key) = req.idempotency_key {
            state.idempotency.insert(key, id.clone());
        }
        state.intents.insert(id, intent.clone());
        Ok(intent)
    }

    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent, GatewayError> {
        self.state
            .lock()
            .intents
            .get(intent_id)
            .cloned()
            .ok_or_else(|| GatewayError::Upstream {
                status: 404,
                message: format!("No such payment_intent: {intent_id}"),
            })
    }

    async fn refund(&self, intent_id: &str, reason: &str) -> Result<Refund, GatewayError> {
        let mut state = self.state.lock();
        if let Some(err) = state.fail_refund.clone() {
            return Err(err);
        }
        state
            .refunds
            .push((intent_id.to_string(), reason.to_string()));
        Ok(Refund {
            id: format!("re_fake_{}", state.refunds.len()),
        })
    }

    async fn cancel_intent(&self, intent_id: &str) -> Result<(), GatewayError> {
        let mut state = self.state.lock();
        if let Some(intent) = state.intents.get_mut(intent_id) {
            intent.status = IntentStatus::Canceled;
        }
        state.cancelled.push(intent_id.to_string());
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
