//! order-server: food ordering for train passengers
//!
//! Takes orders for delivery to a train seat, a home address or a station
//! counter and drives them through payment, kitchen preparation and
//! delivery:
//! - Idempotent checkout with atomic stock reservation
//! - Payment through a gateway adapter (Stripe), reconciled by webhook
//!   and client confirmation
//! - Kitchen readiness from the train timetable
//! - Fire-and-forget lifecycle events

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod events;
pub mod gateway;
pub mod orders;
pub mod readiness;
pub mod state;

pub use config::Config;
pub use state::AppState;
