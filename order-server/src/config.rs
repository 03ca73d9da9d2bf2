//! Order server configuration

use crate::orders::pricing::{DeliveryFees, PricingPolicy};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Where orders, catalog and schedules live
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    Postgres { database_url: String },
    /// Process-local store, for development and single-instance demos
    Memory,
}

/// Which payment gateway adapter is wired in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayBackend {
    Stripe,
    /// In-process gateway that accepts every intent (development only)
    Fake,
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Environment: development | staging | production
    pub environment: String,
    pub http_port: u16,
    pub storage: StorageBackend,
    pub gateway: GatewayBackend,
    /// Stripe secret key
    pub stripe_secret_key: String,
    /// Stripe webhook signing secret
    pub stripe_webhook_secret: String,
    /// Stripe REST base URL (overridable for sandboxes)
    pub stripe_api_base: String,
    /// JWT secret shared with the identity service
    pub jwt_secret: String,
    /// ISO currency code passed to the gateway
    pub currency: String,
    pub tax_rate_bp: u32,
    pub delivery_fees: DeliveryFees,
    /// Kitchen preparation time assumed for train deliveries
    pub prep_minutes: u32,
    pub gateway_timeout_secs: u64,
    /// Delay before a queued event is dispatched
    pub event_settle_ms: u64,
    pub event_queue_capacity: usize,
    /// Checkout rate limit per client IP
    pub checkout_max_requests: u32,
    pub checkout_window_secs: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, BoxError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, BoxError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let environment = lookup("ENVIRONMENT").unwrap_or_else(|| "development".into());

        let storage = match lookup("STORAGE_BACKEND").as_deref().unwrap_or("postgres") {
            "postgres" => StorageBackend::Postgres {
                database_url: lookup("DATABASE_URL").ok_or("DATABASE_URL must be set")?,
            },
            "memory" => StorageBackend::Memory,
            other => return Err(format!("unknown STORAGE_BACKEND: {other}").into()),
        };

        let gateway = match lookup("PAYMENT_GATEWAY").as_deref().unwrap_or("stripe") {
            "stripe" => GatewayBackend::Stripe,
            "fake" if environment == "development" => GatewayBackend::Fake,
            "fake" => {
                return Err(
                    format!("PAYMENT_GATEWAY=fake is not allowed in {environment}").into(),
                );
            }
            other => return Err(format!("unknown PAYMENT_GATEWAY: {other}").into()),
        };

        let delivery_fees = DeliveryFees {
            train: parse_or(&lookup, "DELIVERY_FEE_TRAIN", 30),
            home: parse_or(&lookup, "DELIVERY_FEE_HOME", 20),
            station: parse_or(&lookup, "DELIVERY_FEE_STATION", 10),
        };
        if !(delivery_fees.train >= delivery_fees.home
            && delivery_fees.home >= delivery_fees.station
            && delivery_fees.station >= 0)
        {
            return Err(format!(
                "delivery fees must satisfy train >= home >= station >= 0, got {delivery_fees:?}"
            )
            .into());
        }

        let tax_rate_bp = parse_or(&lookup, "TAX_RATE_BP", 500);
        if tax_rate_bp > 10_000 {
            return Err(format!("TAX_RATE_BP must be <= 10000, got {tax_rate_bp}").into());
        }

        Ok(Self {
            http_port: parse_or(&lookup, "HTTP_PORT", 8080),
            storage,
            gateway,
            stripe_secret_key: require_secret(&lookup, "STRIPE_SECRET_KEY", &environment)?,
            stripe_webhook_secret: require_secret(&lookup, "STRIPE_WEBHOOK_SECRET", &environment)?,
            stripe_api_base: lookup("STRIPE_API_BASE")
                .unwrap_or_else(|| "https://api.stripe.com".into()),
            jwt_secret: require_secret(&lookup, "JWT_SECRET", &environment)?,
            currency: lookup("CURRENCY").unwrap_or_else(|| "inr".into()),
            tax_rate_bp,
            delivery_fees,
            prep_minutes: parse_or(&lookup, "PREP_MINUTES", 20),
            gateway_timeout_secs: parse_or(&lookup, "GATEWAY_TIMEOUT_SECS", 10),
            event_settle_ms: parse_or(&lookup, "EVENT_SETTLE_MS", 50),
            event_queue_capacity: parse_or(&lookup, "EVENT_QUEUE_CAPACITY", 1024),
            checkout_max_requests: parse_or(&lookup, "CHECKOUT_RATE_LIMIT", 10),
            checkout_window_secs: parse_or(&lookup, "CHECKOUT_RATE_WINDOW_SECS", 60),
            environment,
        })
    }

    /// Backend name for logs; never includes the connection string
    pub fn storage_kind(&self) -> &'static str {
        match self.storage {
            StorageBackend::Postgres { .. } => "postgres",
            StorageBackend::Memory => "memory",
        }
    }

    pub fn pricing_policy(&self) -> PricingPolicy {
        PricingPolicy::new(self.tax_rate_bp, self.delivery_fees)
    }
}

/// Require a secret: must be set and non-empty outside development.
fn require_secret<F>(lookup: &F, name: &str, environment: &str) -> Result<String, BoxError>
where
    F: Fn(&str) -> Option<String>,
{
    let val = match lookup(name) {
        Some(v) => v,
        None => {
            if environment != "development" {
                return Err(format!("{name} must be set in {environment} environment").into());
            }
            format!("dev-{name}-not-for-production")
        }
    };
    if val.is_empty() && environment != "development" {
        return Err(format!("{name} must not be empty in {environment} environment").into());
    }
    Ok(val)
}

fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(name)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
