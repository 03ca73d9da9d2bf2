//! Application state for the order server

use std::sync::Arc;
use std::time::Duration;

use crate::auth::{InMemoryRateLimiter, RateLimitRule, RateLimiter};
use crate::config::{Config, GatewayBackend, StorageBackend};
use crate::db::Stores;
use crate::db::memory::MemoryStore;
use crate::db::postgres::PgStore;
use crate::events::{EventEmitter, EventQueueConfig, EventSink, LogSink};
use crate::gateway::PaymentGateway;
use crate::gateway::fake::FakeGateway;
use crate::gateway::stripe::StripeGateway;
use crate::orders::{EngineSettings, OrderEngine};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Order lifecycle engine
    pub engine: Arc<OrderEngine>,
    /// JWT secret shared with the identity service
    pub jwt_secret: Arc<str>,
    /// Rate limiter for checkout
    pub rate_limiter: Arc<dyn RateLimiter>,
    pub checkout_limit: RateLimitRule,
}

impl AppState {
    /// Build storage, gateway, event queue and engine from configuration
    pub async fn new(config: &Config) -> Result<Self, BoxError> {
        let stores = match &config.storage {
            StorageBackend::Postgres { database_url } => {
                let store = PgStore::connect(database_url).await?;
                tracing::info!("Connected to PostgreSQL");
                Stores::from_backend(Arc::new(store))
            }
            StorageBackend::Memory => {
                tracing::warn!("Using in-memory storage, data is lost on restart");
                Stores::from_backend(Arc::new(MemoryStore::new()))
            }
        };

        let gateway: Arc<dyn PaymentGateway> = match config.gateway {
            GatewayBackend::Stripe => Arc::new(StripeGateway::new(
                config.stripe_secret_key.clone(),
                config.stripe_webhook_secret.clone(),
                config.stripe_api_base.clone(),
                Duration::from_secs(config.gateway_timeout_secs),
            )?),
            GatewayBackend::Fake => {
                tracing::warn!("Using fake payment gateway");
                Arc::new(FakeGateway::new(config.stripe_webhook_secret.clone()))
            }
        };

        let sinks: Vec<Arc<dyn EventSink>> = vec![Arc::new(LogSink)];
        // Dispatcher lives as long as the emitter; its handle is not awaited
        let (events, _dispatcher) = EventEmitter::start(
            sinks,
            EventQueueConfig {
                capacity: config.event_queue_capacity,
                settle: Duration::from_millis(config.event_settle_ms),
            },
        );

        let engine = OrderEngine::new(
            stores,
            gateway,
            events,
            config.pricing_policy(),
            EngineSettings {
                currency: config.currency.clone(),
                prep_minutes: config.prep_minutes,
            },
        );

        Ok(Self::from_parts(
            engine,
            &config.jwt_secret,
            Arc::new(InMemoryRateLimiter::new()),
            RateLimitRule {
                max_requests: config.checkout_max_requests,
                window_secs: config.checkout_window_secs,
            },
        ))
    }

    /// Assemble state from prebuilt parts
    pub fn from_parts(
        engine: OrderEngine,
        jwt_secret: &str,
        rate_limiter: Arc<dyn RateLimiter>,
        checkout_limit: RateLimitRule,
    ) -> Self {
        Self {
            engine: Arc::new(engine),
            jwt_secret: Arc::from(jwt_secret),
            rate_limiter,
            checkout_limit,
        }
    }
}
