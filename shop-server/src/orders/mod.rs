//! Order lifecycle and payment reconciliation
//!
//! - [`store`]: redb persistence with optimistic versioning
//! - [`service`]: order creation and payment preference generation
//! - [`reconcile`]: webhook-driven payment reconciliation
//! - [`money`]: decimal arithmetic and monetary validation

pub mod money;
pub mod reconcile;
pub mod service;
pub mod store;

pub use reconcile::PaymentReconciler;
pub use service::{Checkout, CheckoutSettings, CreateOrder, OrderService};
pub use store::{OrderStore, StoreError};
