//! Collaborator ports around the order core
//!
//! The order service depends on the catalog, cart and coupon systems only
//! through these traits. The embedded implementations in this module run on
//! the same redb database as the order store, so the server works standalone;
//! tests substitute in-process doubles.

pub mod cart;
pub mod catalog;
pub mod coupon;

pub use cart::{CartService, EmbeddedCartStore};
pub use catalog::{EmbeddedCatalog, ProductCatalog};
pub use coupon::{CouponService, EmbeddedCouponStore};
