//! Order Model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Order status
///
/// `Available` is the only non-terminal state. The only valid transitions are
/// `Available -> Paid` and `Available -> Cancelled`; both destinations are
/// terminal and no transition leaves them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Available,
    Paid,
    Cancelled,
}

impl OrderStatus {
    /// True for states no transition leaves
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Paid | OrderStatus::Cancelled)
    }

    /// Whether the state machine permits moving from `self` to `next`
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Available, OrderStatus::Paid)
                | (OrderStatus::Available, OrderStatus::Cancelled)
        )
    }
}

/// Line item: an immutable snapshot of one product's price and quantity,
/// taken from the cart at order-creation time. Never re-derived from the
/// live catalog afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineItem {
    /// Product reference (catalog ID)
    pub product_ref: String,
    pub product_name: String,
    /// Snapshotted price per unit in currency unit
    pub unit_price: f64,
    pub quantity: i32,
}

/// Payment record attached by reconciliation, built from the gateway's
/// authoritative payment resource (never from the webhook body).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentRecord {
    /// Gateway-assigned payment id
    pub gateway_payment_id: String,
    pub currency: String,
    /// e.g. "credit_card", "account_money"
    pub payment_method_type: String,
    /// Gateway payment status (e.g. "approved", "rejected", "in_process")
    pub status: String,
    pub status_detail: String,
    pub authorization_code: Option<String>,
    pub captured_at: Option<DateTime<Utc>>,
    /// Amount in currency unit
    pub amount: f64,
}

/// Order aggregate root
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    /// Customer reference (account collaborator identity)
    pub customer_id: String,
    pub created_at: DateTime<Utc>,
    /// Non-empty, immutable after creation
    pub line_items: Vec<LineItem>,
    /// Discount amount in currency unit
    pub discount: f64,
    /// Tax amount in currency unit
    pub tax: f64,
    /// Total amount in currency unit (caller-computed at creation)
    pub total: f64,
    pub coupon_code: Option<String>,
    /// Gateway preference id, set once a payment preference exists.
    /// Regeneration while still Available overwrites it.
    pub gateway_preference_id: Option<String>,
    /// Set only by reconciliation
    pub payment: Option<PaymentRecord>,
    pub status: OrderStatus,
    /// Optimistic concurrency version, bumped on every store update
    pub version: u64,
}

impl Order {
    /// Total quantity across all line items
    pub fn total_quantity(&self) -> i64 {
        self.line_items.iter().map(|i| i.quantity as i64).sum()
    }
}
