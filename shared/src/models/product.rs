//! Product Model

use serde::{Deserialize, Serialize};

/// Product entity (embedded catalog record)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    /// Catalog reference (String ID)
    pub reference: String,
    pub name: String,
    /// Price in currency unit
    pub price: f64,
    pub image_url: Option<String>,
    pub category: Option<String>,
    /// Units currently in stock
    pub stock: i32,
}

/// Coupon entity (embedded coupon record)
///
/// Validity and discount semantics live with the coupon collaborator;
/// the order core only applies discounts computed upstream and registers
/// usage on order creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coupon {
    pub code: String,
    /// Discount as a percentage of the cart subtotal
    pub discount_percent: f64,
    /// How many more times the coupon may be used; None = unlimited
    pub remaining_uses: Option<u32>,
    pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
}
