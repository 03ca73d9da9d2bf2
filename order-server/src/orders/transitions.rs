//! Staff-driven status changes, agent assignment and rating

use shared::error::ErrorCode;
use shared::order::{
    AssignRequest, CancelRequest, Order, OrderStatus, PaymentStatus, RateOrderRequest,
    UpdateStatusRequest,
};
use shared::util::now_millis;

use super::error::OrderError;
use super::validation::{MAX_REVIEW_LEN, optional_text};
use super::{DELIVERY_ETA_MINUTES, OrderEngine};
use crate::auth::{Principal, Role};
use crate::events::OrderEventKind;

/// Reject `order.status -> to` unless the transition table allows it
pub(crate) fn ensure_transition(order: &Order, to: OrderStatus) -> Result<(), OrderError> {
    if order.status.can_transition_to(to) {
        Ok(())
    } else {
        Err(OrderError::InvalidTransition {
            order_id: order.id.clone(),
            from: order.status,
            to,
        })
    }
}

impl OrderEngine {
    /// Move an order along the lifecycle. Cancellation is routed through the
    /// cancel flow so stock and payment are compensated.
    pub async fn update_status(
        &self,
        principal: &Principal,
        order_id: &str,
        req: UpdateStatusRequest,
    ) -> Result<Order, OrderError> {
        if !principal.is_staff() {
            return Err(OrderError::PermissionDenied(
                "Only staff can change order status".to_string(),
            ));
        }

        let target: OrderStatus = req.status.parse().map_err(|_| {
            OrderError::invalid(
                ErrorCode::InvalidRequest,
                "status",
                format!("Unknown order status '{}'", req.status),
            )
        })?;
        if let Some(location) = &req.driver_location
            && !location.is_valid()
        {
            return Err(OrderError::invalid(
                ErrorCode::InvalidDriverLocation,
                "driver_location",
                "Latitude must be within [-90, 90] and longitude within [-180, 180]",
            ));
        }

        if target == OrderStatus::Cancelled {
            return self
                .cancel_as(principal, order_id, CancelRequest { reason: req.note }, true)
                .await;
        }

        let actor = principal.clone();
        let note = optional_text(req.note.as_deref());
        let location = req.driver_location;
        let now = now_millis();

        let modified = self
            .orders
            .modify(
                order_id,
                Box::new(move |order| {
                    if actor.role == Role::Delivery
                        && order.assigned_driver.as_deref() != Some(actor.user_id.as_str())
                    {
                        return Err(OrderError::PermissionDenied(
                            "Order is assigned to another agent".to_string(),
                        ));
                    }
                    ensure_transition(order, target)?;

                    order.record_status(target, actor.user_id.as_str(), note, now);
                    if let Some(location) = location {
                        order.driver_location = Some(location);
                    }
                    // Cash is collected on handover
                    if target == OrderStatus::Delivered
                        && !order.payment.method.is_online()
                        && order.payment.status == PaymentStatus::Pending
                    {
                        order.payment.status = PaymentStatus::Completed;
                        order.payment.paid_at = Some(now);
                    }
                    Ok(true)
                }),
            )
            .await?;

        let order = modified.order;
        tracing::info!(
            order_id = %order.id,
            status = %order.status,
            by = %principal.user_id,
            "Order status updated"
        );
        self.emit(OrderEventKind::for_status(order.status), &order);
        Ok(order)
    }

    /// Hand a ready order to a delivery agent
    pub async fn assign_order(
        &self,
        principal: &Principal,
        order_id: &str,
        req: AssignRequest,
    ) -> Result<Order, OrderError> {
        if !matches!(principal.role, Role::Admin | Role::Restaurant) {
            return Err(OrderError::PermissionDenied(
                "Only admins and restaurant staff can assign orders".to_string(),
            ));
        }
        let agent_id = optional_text(Some(&req.agent_id)).ok_or_else(|| {
            OrderError::invalid(ErrorCode::DriverRequired, "agent_id", "agent_id is required")
        })?;

        let by = principal.user_id.clone();
        let now = now_millis();
        let modified = self
            .orders
            .modify(
                order_id,
                Box::new(move |order| {
                    if order.status != OrderStatus::ReadyForPickup {
                        return Err(OrderError::InvalidTransition {
                            order_id: order.id.clone(),
                            from: order.status,
                            to: OrderStatus::OutForDelivery,
                        });
                    }
                    order.assigned_driver = Some(agent_id.clone());
                    order.estimated_delivery_at = Some(now + DELIVERY_ETA_MINUTES * 60_000);
                    order.record_status(
                        OrderStatus::OutForDelivery,
                        by,
                        Some(format!("Assigned to {agent_id}")),
                        now,
                    );
                    Ok(true)
                }),
            )
            .await?;

        let order = modified.order;
        tracing::info!(
            order_id = %order.id,
            agent_id = ?order.assigned_driver,
            "Order assigned"
        );
        self.emit(OrderEventKind::Assigned, &order);
        Ok(order)
    }

    /// Customer rating of a delivered order, once
    pub async fn rate_order(
        &self,
        principal: &Principal,
        order_id: &str,
        req: RateOrderRequest,
    ) -> Result<Order, OrderError> {
        if !(1..=5).contains(&req.rating) {
            return Err(OrderError::invalid(
                ErrorCode::ValueOutOfRange,
                "rating",
                "Rating must be between 1 and 5",
            ));
        }
        let review = optional_text(req.review.as_deref());
        if review
            .as_ref()
            .is_some_and(|r| r.chars().count() > MAX_REVIEW_LEN)
        {
            return Err(OrderError::invalid(
                ErrorCode::ValueOutOfRange,
                "review",
                format!("Review must be at most {MAX_REVIEW_LEN} characters"),
            ));
        }

        let user_id = principal.user_id.clone();
        let rating = req.rating;
        let now = now_millis();
        let modified = self
            .orders
            .modify(
                order_id,
                Box::new(move |order| {
                    if !order.is_owned_by(&user_id) {
                        return Err(OrderError::PermissionDenied(
                            "Only the customer who placed the order can rate it".to_string(),
                        ));
                    }
                    if order.status != OrderStatus::Delivered {
                        return Err(OrderError::NotRateable(order.status));
                    }
                    if order.rating.is_some() {
                        return Err(OrderError::AlreadyRated);
                    }
                    order.rating = Some(rating);
                    order.review = review;
                    order.updated_at = now;
                    Ok(true)
                }),
            )
            .await?;

        tracing::info!(order_id = %order_id, rating, "Order rated");
        Ok(modified.order)
    }
}
