//! Read side: single order, paginated list, tracking view

use shared::error::ErrorCode;
use shared::models::TrainSchedule;
use shared::order::{
    Order, OrderPage, OrdersQuery, OrderStatus, StopProgress, TrackedStop, TrackingView,
};
use shared::util::now_millis;

use super::OrderEngine;
use super::error::OrderError;
use crate::auth::Principal;
use crate::db::OrderFilter;

pub const DEFAULT_PER_PAGE: u32 = 20;
pub const MAX_PER_PAGE: u32 = 100;

impl OrderEngine {
    pub async fn get_order(&self, principal: &Principal, order_id: &str) -> Result<Order, OrderError> {
        let order = self
            .orders
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| OrderError::OrderNotFound(order_id.to_string()))?;
        if !principal.can_view(&order) {
            // Same answer as a missing order
            return Err(OrderError::OrderNotFound(order_id.to_string()));
        }
        Ok(order)
    }

    /// Newest first. Customers only see their own orders.
    pub async fn list_orders(
        &self,
        principal: &Principal,
        query: OrdersQuery,
    ) -> Result<OrderPage, OrderError> {
        let status = query
            .status
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<OrderStatus>().map_err(|_| {
                    OrderError::invalid(
                        ErrorCode::InvalidRequest,
                        "status",
                        format!("Unknown order status '{s}'"),
                    )
                })
            })
            .transpose()?;

        let page = query.page.unwrap_or(1).max(1);
        let per_page = query
            .per_page
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, MAX_PER_PAGE);

        let filter = OrderFilter {
            user_id: (!principal.is_staff()).then(|| principal.user_id.clone()),
            status,
            limit: per_page,
            offset: (page - 1).saturating_mul(per_page),
        };
        let (items, total) = self.orders.list(&filter).await?;

        Ok(OrderPage {
            items,
            total,
            page,
            per_page,
        })
    }

    pub async fn track_order(
        &self,
        principal: &Principal,
        order_id: &str,
    ) -> Result<TrackingView, OrderError> {
        let order = self.get_order(principal, order_id).await?;

        let stops = match &order.schedule {
            Some(info) => {
                match self
                    .readiness
                    .schedule_for(&info.train_no, info.service_date)
                    .await
                {
                    Some(schedule) => annotate_stops(&schedule, info.station_index, now_millis()),
                    None => Vec::new(),
                }
            }
            None => Vec::new(),
        };

        Ok(TrackingView {
            status_label: order.status.display_label().to_string(),
            expected_ready_at: order.schedule.as_ref().map(|s| s.expected_ready_at),
            order_id: order.id,
            order_number: order.order_number,
            status: order.status,
            assigned_driver: order.assigned_driver,
            driver_location: order.driver_location,
            estimated_delivery_at: order.estimated_delivery_at,
            schedule: order.schedule,
            stops,
            history: order.status_history,
        })
    }
}

/// Mark each stop passed / current / upcoming relative to `now`.
/// A stop is current while the train is at it or travelling towards it.
pub fn annotate_stops(
    schedule: &TrainSchedule,
    delivery_index: u32,
    now: i64,
) -> Vec<TrackedStop> {
    let current = schedule.stops.iter().position(|s| now <= s.departure);
    schedule
        .stops
        .iter()
        .enumerate()
        .map(|(i, stop)| TrackedStop {
            station: stop.station.clone(),
            arrival: stop.arrival,
            departure: stop.departure,
            progress: match current {
                Some(c) if i < c => StopProgress::Passed,
                Some(c) if i == c => StopProgress::Current,
                Some(_) => StopProgress::Upcoming,
                None => StopProgress::Passed,
            },
            is_delivery_stop: i as u32 == delivery_index,
        })
        .collect()
}
