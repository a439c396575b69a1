//! Data models
//!
//! Shared between shop-server and any future client crate (via API).

pub mod order;
pub mod product;

// Re-exports
pub use order::*;
pub use product::*;
