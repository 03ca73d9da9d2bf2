//! Shared types for the station ordering platform
//!
//! Domain types used by the order server and its clients: catalog and
//! schedule models, the order aggregate with its status machine, request
//! and response DTOs, and the unified error system.

pub mod error;
pub mod models;
pub mod order;
pub mod util;

// Re-exports
pub use axum::Json;
pub use http;
pub use serde::{Deserialize, Serialize};

pub use error::{ApiResponse, AppError, AppResult, ErrorCode};
pub use order::{Order, OrderStatus, PaymentMethod, PaymentStatus};
