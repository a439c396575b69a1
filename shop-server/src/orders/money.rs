//! Money calculation utilities using rust_decimal for precision
//!
//! All monetary arithmetic runs on `Decimal` internally and converts back to
//! `f64` only for storage/serialization. Line items carry prices snapshotted
//! at order creation, so every function here works from the stored snapshot
//! and never re-reads the live catalog.

use rust_decimal::prelude::*;
use shared::error::{AppError, AppResult, ErrorCode};
use shared::models::LineItem;

/// Rounding strategy for monetary values (2 decimal places, half-up)
const DECIMAL_PLACES: u32 = 2;

/// Tolerance for monetary comparisons (0.01)
pub const MONEY_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Maximum allowed price per unit
const MAX_PRICE: f64 = 1_000_000.0;
/// Maximum allowed quantity per line item
const MAX_QUANTITY: i32 = 9999;

/// Validate that a f64 value is finite (not NaN, not Infinity)
#[inline]
fn require_finite(value: f64, field_name: &str) -> AppResult<()> {
    if !value.is_finite() {
        return Err(AppError::validation(format!(
            "{} must be a finite number, got {}",
            field_name, value
        ))
        .with_detail("field", field_name));
    }
    Ok(())
}

/// Validate a line item before it is persisted into an order snapshot
pub fn validate_line_item(item: &LineItem) -> AppResult<()> {
    if item.product_ref.trim().is_empty() {
        return Err(AppError::new(ErrorCode::RequiredField)
            .with_detail("field", "product_ref"));
    }

    // Price must be finite and non-negative
    require_finite(item.unit_price, "unit_price")?;
    if item.unit_price < 0.0 {
        return Err(AppError::validation(format!(
            "unit_price must be non-negative, got {}",
            item.unit_price
        )));
    }
    if item.unit_price > MAX_PRICE {
        return Err(AppError::validation(format!(
            "unit_price exceeds maximum allowed ({}), got {}",
            MAX_PRICE, item.unit_price
        )));
    }

    // Quantity must be positive and within bounds
    if item.quantity <= 0 {
        return Err(AppError::validation(format!(
            "quantity must be positive, got {}",
            item.quantity
        )));
    }
    if item.quantity > MAX_QUANTITY {
        return Err(AppError::validation(format!(
            "quantity exceeds maximum allowed ({}), got {}",
            MAX_QUANTITY, item.quantity
        )));
    }

    Ok(())
}

/// Convert f64 to Decimal for calculation
#[inline]
pub fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default()
}

/// Convert Decimal back to f64 for storage, rounded to 2 decimal places
#[inline]
pub fn to_f64(value: Decimal) -> f64 {
    value
        .round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
        .unwrap_or_default()
}

/// Round a decimal to the monetary scale (half-up)
#[inline]
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// Line total for one item: unit_price * quantity, rounded to 2 decimals
pub fn line_total(item: &LineItem) -> Decimal {
    let unit_price = to_decimal(item.unit_price);
    let quantity = Decimal::from(item.quantity);
    round_money(unit_price * quantity)
}

/// Sum of all line totals
pub fn items_sum(items: &[LineItem]) -> Decimal {
    items.iter().map(line_total).sum()
}

/// Compare two monetary values for equality (within 0.01 tolerance)
pub fn money_eq(a: f64, b: f64) -> bool {
    let diff = (to_decimal(a) - to_decimal(b)).abs();
    diff < MONEY_TOLERANCE
}

/// Validate the totals invariant: total == items_sum - discount + tax
/// (within monetary tolerance).
pub fn validate_order_totals(
    items: &[LineItem],
    discount: f64,
    tax: f64,
    total: f64,
) -> AppResult<()> {
    require_finite(discount, "discount")?;
    require_finite(tax, "tax")?;
    require_finite(total, "total")?;
    if discount < 0.0 || tax < 0.0 || total < 0.0 {
        return Err(AppError::validation(
            "discount, tax and total must be non-negative",
        ));
    }

    let expected = items_sum(items) - to_decimal(discount) + to_decimal(tax);
    if !money_eq(to_f64(expected), total) {
        return Err(AppError::new(ErrorCode::OrderTotalMismatch)
            .with_detail("expected", to_f64(expected).to_string())
            .with_detail("declared", total.to_string()));
    }
    Ok(())
}

/// Difference between the declared order total and the sum of its line
/// totals. When the absolute difference exceeds [`MONEY_TOLERANCE`] the
/// payment preference needs a synthetic adjustment line carrying it
/// (discounts and taxes are not itemized on the gateway side).
///
/// Positive means the charged total is above the item sum (tax dominates),
/// negative means below (discount dominates).
pub fn preference_adjustment(items: &[LineItem], total: f64) -> Option<Decimal> {
    let diff = round_money(to_decimal(total) - items_sum(items));
    if diff.abs() > MONEY_TOLERANCE {
        Some(diff)
    } else {
        None
    }
}
