//! Shared types for the shop system
//!
//! Common types used across crates: domain models, error types, and
//! response structures.

pub mod error;
pub mod models;

// Re-exports
pub use error::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};
pub use models::{LineItem, Order, OrderStatus, PaymentRecord, Product};
pub use serde::{Deserialize, Serialize};
