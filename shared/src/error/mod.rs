//! Unified error system
//!
//! - [`ErrorCode`]: numeric codes shared with clients
//! - [`ErrorCategory`]: classification by code range
//! - [`AppError`]: code + message + optional structured details
//! - [`ApiResponse`]: the JSON envelope every endpoint returns
//!
//! # Error Code Ranges
//!
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 2xxx: Permission errors
//! - 3xxx: Schedule errors
//! - 4xxx: Order errors
//! - 5xxx: Payment errors
//! - 6xxx: Product / restaurant errors
//! - 7xxx: Delivery errors
//! - 9xxx: System errors
//!
//! # Example
//!
//! ```
//! use shared::error::{AppError, ErrorCode, ApiResponse};
//!
//! let err = AppError::validation("qty must be between 1 and 99")
//!     .with_detail("field", "items[0].qty");
//! assert_eq!(err.code, ErrorCode::ValidationFailed);
//!
//! let response = ApiResponse::<()>::error(&err);
//! assert_eq!(response.code, Some(2));
//! ```

mod category;
mod codes;
mod http;
mod types;

pub use category::ErrorCategory;
pub use codes::{ErrorCode, InvalidErrorCode};
pub use types::{ApiResponse, AppError, AppResult};
