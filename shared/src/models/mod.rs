//! Catalog and timetable models
//!
//! Catalog IDs are snowflake `i64` values (see [`crate::util::snowflake_id`]);
//! timestamps are UTC milliseconds.

pub mod product;
pub mod schedule;

// Re-exports
pub use product::*;
pub use schedule::*;
