//! Payment reconciliation
//!
//! Two paths can complete an online payment: the gateway webhook and the
//! client's explicit confirmation. Both funnel into `apply_outcome`, which
//! is a no-op once the payment is settled (completed, refunded or refund
//! failed), so duplicates and races are harmless.

use shared::order::{
    ConfirmOutcome, ConfirmPaymentRequest, ConfirmPaymentResponse, Order, OrderStatus,
    PaymentStatus, WebhookAck,
};
use shared::util::now_millis;

use super::error::OrderError;
use super::{OrderEngine, SYSTEM_ACTOR};
use crate::auth::Principal;
use crate::events::OrderEventKind;
use crate::gateway::{IntentStatus, WebhookError, WebhookKind};

/// Payment result reported by the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    Succeeded,
    Failed,
    Canceled,
}

impl OrderEngine {
    /// Verify and apply a gateway webhook. Unknown events and unknown
    /// intents are acknowledged without effect.
    pub async fn handle_webhook(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookAck, OrderError> {
        let signature = signature.ok_or(WebhookError::MissingSignature)?;
        let event = self.gateway.verify_webhook(payload, signature)?;

        let outcome = match event.kind() {
            WebhookKind::Succeeded => PaymentOutcome::Succeeded,
            WebhookKind::Failed => PaymentOutcome::Failed,
            WebhookKind::Canceled => PaymentOutcome::Canceled,
            WebhookKind::Other => {
                tracing::debug!(event_type = %event.event_type, "Ignoring webhook event");
                return Ok(WebhookAck { received: true });
            }
        };

        let Some(intent_id) = event.intent_id else {
            tracing::warn!(event_id = %event.id, "Webhook event without payment intent");
            return Ok(WebhookAck { received: true });
        };
        let Some(order) = self.orders.find_by_gateway_id(&intent_id).await? else {
            tracing::warn!(intent_id = %intent_id, "Webhook for unknown payment intent");
            return Ok(WebhookAck { received: true });
        };

        self.apply_outcome(&order.id, outcome, "webhook").await?;
        Ok(WebhookAck { received: true })
    }

    /// Client-side confirmation after the payment sheet closes
    pub async fn confirm_payment(
        &self,
        principal: &Principal,
        req: ConfirmPaymentRequest,
    ) -> Result<ConfirmPaymentResponse, OrderError> {
        let order = self
            .orders
            .find_by_id(&req.order_id)
            .await?
            .ok_or_else(|| OrderError::OrderNotFound(req.order_id.clone()))?;
        if !(principal.owns(&order) || principal.is_admin()) {
            return Err(OrderError::PermissionDenied(
                "Not allowed to confirm payment for this order".to_string(),
            ));
        }
        if order.payment.gateway_id.as_deref() != Some(req.payment_intent_id.as_str()) {
            return Err(OrderError::IntentMismatch);
        }
        if order.payment.status.is_settled() {
            return Ok(ConfirmPaymentResponse {
                status: ConfirmOutcome::AlreadyConfirmed,
                order,
            });
        }

        let intent = self.gateway.retrieve_intent(&req.payment_intent_id).await?;
        if intent.status != IntentStatus::Succeeded {
            tracing::debug!(order_id = %order.id, status = ?intent.status, "Payment not yet succeeded");
            return Ok(ConfirmPaymentResponse {
                status: ConfirmOutcome::NotSucceeded,
                order,
            });
        }
        if intent.amount_cents != order.totals.final_cents {
            tracing::warn!(
                order_id = %order.id,
                expected = order.totals.final_cents,
                actual = intent.amount_cents,
                "Payment amount mismatch"
            );
            return Err(OrderError::AmountMismatch {
                expected: order.totals.final_cents,
                actual: intent.amount_cents,
            });
        }

        let (order, changed) = self
            .apply_outcome(&order.id, PaymentOutcome::Succeeded, "client_confirm")
            .await?;
        Ok(ConfirmPaymentResponse {
            status: if changed {
                ConfirmOutcome::Confirmed
            } else {
                ConfirmOutcome::AlreadyConfirmed
            },
            order,
        })
    }

    /// Apply a gateway outcome under the order lock. Returns the order and
    /// whether anything changed.
    pub(crate) async fn apply_outcome(
        &self,
        order_id: &str,
        outcome: PaymentOutcome,
        source: &'static str,
    ) -> Result<(Order, bool), OrderError> {
        let now = now_millis();
        let modified = self
            .orders
            .modify(
                order_id,
                Box::new(move |order| Ok(apply_to_order(order, outcome, source, now))),
            )
            .await?;
        let order = modified.order;

        if !modified.changed {
            tracing::debug!(order_id = %order.id, ?outcome, source, "Payment outcome already applied");
            return Ok((order, false));
        }

        tracing::info!(
            order_id = %order.id,
            ?outcome,
            source,
            status = %order.status,
            payment_status = %order.payment.status,
            "Payment outcome applied"
        );

        match outcome {
            PaymentOutcome::Succeeded => {
                self.emit(OrderEventKind::PaymentCompleted, &order);
                // Money arrived for an order that was cancelled meanwhile
                if order.status == OrderStatus::Cancelled {
                    let order = self.refund_order(order).await?;
                    return Ok((order, true));
                }
            }
            PaymentOutcome::Failed => self.emit(OrderEventKind::PaymentFailed, &order),
            PaymentOutcome::Canceled => {
                self.restore_stock(&order).await;
                self.emit(OrderEventKind::Cancelled, &order);
            }
        }
        Ok((order, true))
    }
}

/// State change for one gateway outcome; `false` means nothing to do
fn apply_to_order(
    order: &mut Order,
    outcome: PaymentOutcome,
    source: &'static str,
    now: i64,
) -> bool {
    if order.payment.status.is_settled() {
        return false;
    }

    match outcome {
        PaymentOutcome::Succeeded => {
            order.payment.status = PaymentStatus::Completed;
            order.payment.paid_at = Some(now);
            order.updated_at = now;
            if order.status.can_transition_to(OrderStatus::Confirmed) {
                order.record_status(
                    OrderStatus::Confirmed,
                    SYSTEM_ACTOR,
                    Some(format!("Payment completed ({source})")),
                    now,
                );
            }
            true
        }
        PaymentOutcome::Failed => {
            if order.payment.status == PaymentStatus::Failed {
                return false;
            }
            order.payment.status = PaymentStatus::Failed;
            order.updated_at = now;
            if order.status.can_transition_to(OrderStatus::FailedPayment) {
                order.record_status(
                    OrderStatus::FailedPayment,
                    SYSTEM_ACTOR,
                    Some(format!("Payment failed ({source})")),
                    now,
                );
            }
            true
        }
        PaymentOutcome::Canceled => {
            if !order.status.can_transition_to(OrderStatus::Cancelled) {
                return false;
            }
            order.payment.status = PaymentStatus::Failed;
            order.cancellation_reason = Some("Payment cancelled".to_string());
            order.record_status(
                OrderStatus::Cancelled,
                SYSTEM_ACTOR,
                Some(format!("Payment intent cancelled ({source})")),
                now,
            );
            true
        }
    }
}
