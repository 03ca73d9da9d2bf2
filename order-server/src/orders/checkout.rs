//! Checkout: idempotent order creation

use std::collections::HashMap;

use shared::error::ErrorCode;
use shared::models::Product;
use shared::order::{
    CreateOrderRequest, CreateOrderResponse, DeliveryInfo, Order, OrderItem, OrderStatus,
    PaymentInfo,
};
use shared::util::{now_millis, order_number};

use super::error::OrderError;
use super::validation::{self, CheckoutLine};
use super::{OrderEngine, SYSTEM_ACTOR};
use crate::auth::Principal;
use crate::db::{CreateOutcome, aggregate_reservations};
use crate::events::OrderEventKind;
use crate::gateway::CreateIntent;

impl OrderEngine {
    /// Place an order.
    ///
    /// With an idempotency key, a repeated request returns the order created
    /// by the first one (`replayed = true`) and reserves nothing. Stock is
    /// decremented atomically with the insert; nothing is written when any
    /// line lacks stock or the payment intent cannot be created.
    pub async fn create_order(
        &self,
        principal: &Principal,
        req: CreateOrderRequest,
    ) -> Result<CreateOrderResponse, OrderError> {
        let key = validation::idempotency_key(req.idempotency_key.as_deref())?;
        if let Some(key) = &key
            && let Some(existing) = self.orders.find_by_idempotency_key(key).await?
        {
            return self.replay(principal, existing).await;
        }

        let checkout = validation::validate_checkout(&req)?;
        let items = self.price_items(&checkout.lines).await?;

        let subtotal_cents = items
            .iter()
            .try_fold(0i64, |acc, item| acc.checked_add(item.line_total_cents()?))
            .ok_or_else(|| {
                OrderError::invalid(ErrorCode::ValidationFailed, "items", "Order total is too large")
            })?;
        let totals = self.pricing.totals(
            subtotal_cents,
            checkout.delivery.delivery_type(),
            checkout.coupon_code.as_deref(),
        );

        let now = now_millis();
        let schedule = match &checkout.delivery {
            DeliveryInfo::Train {
                train_no,
                station_name,
                ..
            } => self.readiness.compute(train_no, station_name, now).await,
            _ => None,
        };

        let online = checkout.method.is_online();
        let mut order = Order {
            id: uuid::Uuid::new_v4().to_string(),
            order_number: order_number(now),
            user_id: principal.user_id.clone(),
            items,
            delivery_info: checkout.delivery,
            totals,
            payment: PaymentInfo::new(checkout.method),
            status: OrderStatus::Pending,
            schedule,
            status_history: Vec::new(),
            idempotency_key: key,
            special_instructions: checkout.special_instructions,
            assigned_driver: None,
            estimated_delivery_at: None,
            driver_location: None,
            cancellation_reason: None,
            rating: None,
            review: None,
            created_at: now,
            updated_at: now,
        };
        order.record_status(
            OrderStatus::Pending,
            principal.user_id.as_str(),
            Some("Order placed".to_string()),
            now,
        );
        if !online {
            order.record_status(
                OrderStatus::Confirmed,
                SYSTEM_ACTOR,
                Some("Cash on delivery".to_string()),
                now,
            );
        }

        let client_secret = if online {
            let intent = self
                .gateway
                .create_intent(CreateIntent {
                    amount_cents: order.totals.final_cents,
                    currency: self.settings.currency.clone(),
                    idempotency_key: Some(order.id.clone()),
                    metadata: vec![
                        ("order_id".to_string(), order.id.clone()),
                        ("order_number".to_string(), order.order_number.clone()),
                        ("user_id".to_string(), order.user_id.clone()),
                    ],
                })
                .await?;
            order.payment.gateway_id = Some(intent.id);
            intent.client_secret
        } else {
            None
        };

        let reservations = aggregate_reservations(order.stock_lines());
        match self.orders.insert_reserving_stock(&order, &reservations).await {
            Ok(CreateOutcome::Created) => {}
            Ok(CreateOutcome::Duplicate(existing)) => {
                // Lost a race with a concurrent request carrying the same key
                self.release_intent(&order).await;
                return self.replay(principal, *existing).await;
            }
            Ok(CreateOutcome::OutOfStock { product_id }) => {
                self.release_intent(&order).await;
                let requested = reservations
                    .iter()
                    .find(|r| r.product_id == product_id)
                    .map(|r| r.qty)
                    .unwrap_or_default();
                return Err(OrderError::OutOfStock {
                    product_id,
                    requested,
                });
            }
            Err(e) => {
                self.release_intent(&order).await;
                return Err(e.into());
            }
        }

        tracing::info!(
            order_id = %order.id,
            order_number = %order.order_number,
            user_id = %order.user_id,
            method = %order.payment.method,
            final_cents = order.totals.final_cents,
            "Order created"
        );
        self.emit(OrderEventKind::Created, &order);

        Ok(CreateOrderResponse {
            order_id: order.id,
            order_number: order.order_number,
            total_cents: order.totals.final_cents,
            status: order.status,
            client_secret,
            replayed: false,
        })
    }

    /// Snapshot each line from the live catalog and check stock up front
    async fn price_items(&self, lines: &[CheckoutLine]) -> Result<Vec<OrderItem>, OrderError> {
        let mut ids: Vec<i64> = lines.iter().map(|l| l.product_id).collect();
        ids.sort_unstable();
        ids.dedup();

        let products: HashMap<i64, Product> = self
            .catalog
            .find_products_by_ids(&ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let mut items = Vec::with_capacity(lines.len());
        let mut wanted: HashMap<i64, u32> = HashMap::new();
        for (i, line) in lines.iter().enumerate() {
            let product = products
                .get(&line.product_id)
                .ok_or(OrderError::ProductNotFound(line.product_id))?;
            if !product.is_orderable() {
                return Err(OrderError::ProductUnavailable(product.id));
            }

            let mut unit_price = product.price_cents;
            for name in &line.selected_options {
                let option = product.option(name).ok_or_else(|| {
                    OrderError::invalid(
                        ErrorCode::ProductOptionNotFound,
                        format!("items[{i}].selected_options"),
                        format!("Unknown option '{name}' for {}", product.name),
                    )
                })?;
                unit_price = unit_price.checked_add(option.price_cents).ok_or_else(|| {
                    OrderError::invalid(
                        ErrorCode::ProductInvalidPrice,
                        format!("items[{i}].selected_options"),
                        format!("Price of {} is out of range", product.name),
                    )
                })?;
            }

            let total = wanted.entry(product.id).or_default();
            *total += line.qty;
            if !product.has_stock_for(*total) {
                return Err(OrderError::OutOfStock {
                    product_id: product.id,
                    requested: *total,
                });
            }

            items.push(OrderItem {
                product_id: product.id,
                name: product.name.clone(),
                qty: line.qty,
                price_cents: unit_price,
                restaurant_id: product.restaurant_id,
                note: line.note.clone(),
                selected_options: line.selected_options.clone(),
            });
        }
        Ok(items)
    }

    /// Answer a repeated request with the order the key already points to
    async fn replay(
        &self,
        principal: &Principal,
        existing: Order,
    ) -> Result<CreateOrderResponse, OrderError> {
        if !principal.owns(&existing) {
            return Err(OrderError::DuplicateIdempotencyKey);
        }

        let client_secret = match (&existing.payment.gateway_id, existing.status) {
            (Some(intent_id), OrderStatus::Pending) => {
                match self.gateway.retrieve_intent(intent_id).await {
                    Ok(intent) => intent.client_secret,
                    Err(e) => {
                        tracing::warn!(order_id = %existing.id, error = %e, "Could not refetch client secret");
                        None
                    }
                }
            }
            _ => None,
        };

        tracing::debug!(order_id = %existing.id, "Idempotent checkout replayed");
        Ok(CreateOrderResponse {
            order_id: existing.id,
            order_number: existing.order_number,
            total_cents: existing.totals.final_cents,
            status: existing.status,
            client_secret,
            replayed: true,
        })
    }

    /// Best-effort cancel of an intent whose order was never persisted
    async fn release_intent(&self, order: &Order) {
        if let Some(intent_id) = &order.payment.gateway_id
            && let Err(e) = self.gateway.cancel_intent(intent_id).await
        {
            tracing::warn!(intent_id = %intent_id, error = %e, "Failed to cancel orphaned payment intent");
        }
    }
}
