//! Order aggregate
//!
//! - [`status`]: canonical lifecycle status and its transition table
//! - [`types`]: the persisted order and its value types
//! - [`dto`]: API request and response bodies

pub mod dto;
pub mod status;
pub mod types;

// Re-exports
pub use dto::*;
pub use status::{OrderStatus, ParseStatusError};
pub use types::*;
