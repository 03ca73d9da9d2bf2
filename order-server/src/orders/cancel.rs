//! Cancellation and its compensations

use shared::order::{CancelRequest, Order, OrderStatus, PaymentStatus};
use shared::util::now_millis;

use super::OrderEngine;
use super::error::OrderError;
use super::validation::optional_text;
use crate::auth::Principal;
use crate::events::OrderEventKind;

const REFUND_REASON: &str = "order_cancelled";

impl OrderEngine {
    /// Cancel on behalf of the customer who placed the order, or an admin.
    ///
    /// Stock is given back, a completed payment is refunded, and a pending
    /// intent is cancelled at the gateway. A refund failure is recorded as
    /// `REFUND_FAILED` and does not undo the cancellation.
    pub async fn cancel_order(
        &self,
        principal: &Principal,
        order_id: &str,
        req: CancelRequest,
    ) -> Result<Order, OrderError> {
        self.cancel_as(principal, order_id, req, false).await
    }

    /// `allow_staff` lets kitchen and delivery staff cancel through the
    /// status endpoint.
    pub(crate) async fn cancel_as(
        &self,
        principal: &Principal,
        order_id: &str,
        req: CancelRequest,
        allow_staff: bool,
    ) -> Result<Order, OrderError> {
        let actor = principal.clone();
        let reason = optional_text(req.reason.as_deref()).unwrap_or_else(|| {
            if principal.is_staff() {
                "Cancelled by staff".to_string()
            } else {
                "Cancelled by customer".to_string()
            }
        });
        let now = now_millis();

        let modified = self
            .orders
            .modify(
                order_id,
                Box::new(move |order| {
                    let allowed = actor.owns(order)
                        || actor.is_admin()
                        || (allow_staff && actor.is_staff());
                    if !allowed {
                        return Err(OrderError::PermissionDenied(
                            "Not allowed to cancel this order".to_string(),
                        ));
                    }
                    if !order.status.is_cancellable() {
                        return Err(OrderError::NotCancellable(order.status));
                    }
                    order.cancellation_reason = Some(reason.clone());
                    order.record_status(OrderStatus::Cancelled, actor.user_id, Some(reason), now);
                    Ok(true)
                }),
            )
            .await?;
        let mut order = modified.order;

        tracing::info!(
            order_id = %order.id,
            by = %principal.user_id,
            reason = ?order.cancellation_reason,
            "Order cancelled"
        );

        self.restore_stock(&order).await;

        match order.payment.status {
            PaymentStatus::Completed if order.payment.gateway_id.is_some() => {
                order = self.refund_order(order).await?;
            }
            PaymentStatus::Pending => {
                if let Some(intent_id) = &order.payment.gateway_id
                    && let Err(e) = self.gateway.cancel_intent(intent_id).await
                {
                    tracing::warn!(order_id = %order.id, error = %e, "Failed to cancel payment intent");
                }
            }
            _ => {}
        }

        self.emit(OrderEventKind::Cancelled, &order);
        Ok(order)
    }

    /// Give every line's quantity back to stock. Failures are logged per
    /// product and do not stop the others.
    pub(crate) async fn restore_stock(&self, order: &Order) {
        for (product_id, qty) in order.stock_lines() {
            if let Err(e) = self.catalog.adjust_stock(product_id, i64::from(qty)).await {
                tracing::error!(
                    order_id = %order.id,
                    product_id,
                    qty,
                    error = %e,
                    "Failed to restore stock"
                );
            }
        }
    }

    /// Refund a completed gateway payment and record the result
    pub(crate) async fn refund_order(&self, order: Order) -> Result<Order, OrderError> {
        let Some(intent_id) = order.payment.gateway_id.clone() else {
            return Ok(order);
        };

        let result = self.gateway.refund(&intent_id, REFUND_REASON).await;
        let now = now_millis();
        let refund_failed = result.is_err();
        if let Err(e) = &result {
            tracing::error!(
                order_id = %order.id,
                intent_id = %intent_id,
                retryable = e.is_retryable(),
                error = %e,
                "Refund failed"
            );
        }

        let modified = self
            .orders
            .modify(
                &order.id,
                Box::new(move |order| {
                    if order.payment.status != PaymentStatus::Completed {
                        return Ok(false);
                    }
                    match result {
                        Ok(refund) => {
                            order.payment.status = PaymentStatus::Refunded;
                            order.payment.refund_id = Some(refund.id);
                            order.payment.refunded_at = Some(now);
                        }
                        Err(e) => {
                            order.payment.status = PaymentStatus::RefundFailed;
                            order.payment.refund_error = Some(e.to_string());
                        }
                    }
                    order.updated_at = now;
                    Ok(true)
                }),
            )
            .await?;

        if refund_failed && modified.changed {
            self.emit(OrderEventKind::RefundFailed, &modified.order);
        }
        Ok(modified.order)
    }
}
