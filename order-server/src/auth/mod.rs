//! Authentication and request throttling

pub mod jwt;
pub mod rate_limit;

pub use jwt::{Principal, Role};
pub use rate_limit::{InMemoryRateLimiter, RateLimitRule, RateLimiter};
