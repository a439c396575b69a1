//! Order lifecycle service
//!
//! Owns order creation and payment preference generation. Reconciliation of
//! gateway notifications lives in [`super::reconcile`].

use crate::collab::{CartService, CouponService};
use crate::gateway::{
    BackUrls, METADATA_ORDER_ID, PaymentGateway, Preference, PreferenceItem, PreferenceRequest,
};
use crate::orders::money;
use crate::orders::store::OrderStore;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use shared::error::{AppError, AppResult, ErrorCode};
use shared::models::{LineItem, Order, OrderStatus};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Checkout parameters shared by every generated preference
#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    /// ISO currency the shop charges in
    pub currency_id: String,
    /// Public URL the gateway posts payment notifications to
    pub notification_url: String,
    pub back_urls: BackUrls,
}

/// Order creation input
#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrder {
    pub customer_id: String,
    pub line_items: Vec<LineItem>,
    #[serde(default)]
    pub discount: f64,
    #[serde(default)]
    pub tax: f64,
    pub total: f64,
    #[serde(default)]
    pub coupon_code: Option<String>,
}

/// A generated checkout, handed back to the storefront
#[derive(Debug, Clone, Serialize)]
pub struct Checkout {
    pub preference_id: String,
    /// URL the buyer is redirected to
    pub redirect_url: String,
}

/// Order lifecycle service
pub struct OrderService {
    store: OrderStore,
    gateway: Arc<dyn PaymentGateway>,
    cart: Arc<dyn CartService>,
    coupons: Arc<dyn CouponService>,
    settings: CheckoutSettings,
}

impl OrderService {
    pub fn new(
        store: OrderStore,
        gateway: Arc<dyn PaymentGateway>,
        cart: Arc<dyn CartService>,
        coupons: Arc<dyn CouponService>,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            store,
            gateway,
            cart,
            coupons,
            settings,
        }
    }

    /// Create a new order from a validated snapshot of the customer's cart.
    ///
    /// The one-active-order-per-customer guard is enforced inside the store
    /// write transaction. Cart clearing and coupon usage registration are
    /// best-effort side effects: their failure is logged, never surfaced.
    pub async fn create_order(&self, input: CreateOrder) -> AppResult<Order> {
        if input.customer_id.trim().is_empty() {
            return Err(AppError::new(ErrorCode::RequiredField)
                .with_detail("field", "customer_id"));
        }
        if input.line_items.is_empty() {
            return Err(AppError::new(ErrorCode::OrderEmpty));
        }
        for item in &input.line_items {
            money::validate_line_item(item)?;
        }
        money::validate_order_totals(
            &input.line_items,
            input.discount,
            input.tax,
            input.total,
        )?;

        let order = Order {
            id: uuid::Uuid::new_v4().to_string(),
            customer_id: input.customer_id,
            created_at: Utc::now(),
            line_items: input.line_items,
            discount: input.discount,
            tax: input.tax,
            total: input.total,
            coupon_code: input.coupon_code.filter(|c| !c.trim().is_empty()),
            gateway_preference_id: None,
            payment: None,
            status: OrderStatus::Available,
            version: 0,
        };

        self.store.insert_new(&order)?;
        info!(
            order_id = %order.id,
            customer_id = %order.customer_id,
            total = order.total,
            "order created"
        );

        if let Err(err) = self.cart.clear_cart(&order.customer_id).await {
            warn!(
                order_id = %order.id,
                customer_id = %order.customer_id,
                error = %err,
                "cart clear failed after order creation"
            );
        }
        if let Some(code) = &order.coupon_code {
            if let Err(err) = self.coupons.register_usage(code).await {
                warn!(
                    order_id = %order.id,
                    coupon = %code,
                    error = %err,
                    "coupon usage registration failed"
                );
            }
        }

        Ok(order)
    }

    /// Generate a payment preference for an order still awaiting payment.
    ///
    /// Preference lines come from the stored price snapshot, never the live
    /// catalog. When the order total differs from the sum of its lines
    /// (order-level discount or tax), a synthetic adjustment line carries the
    /// difference so the charged amount equals the order total. Regenerating
    /// overwrites the previously stored preference id.
    pub async fn generate_payment_preference(&self, order_id: &str) -> AppResult<Checkout> {
        let order = self
            .store
            .get(order_id)?
            .ok_or_else(|| AppError::order_not_found(order_id))?;

        match order.status {
            OrderStatus::Available => {}
            OrderStatus::Paid => return Err(AppError::new(ErrorCode::OrderAlreadyPaid)),
            OrderStatus::Cancelled => {
                return Err(AppError::new(ErrorCode::OrderAlreadyCancelled));
            }
        }

        let request = self.build_preference_request(&order);
        let preference: Preference = self.gateway.create_preference(&request).await?;

        let mut updated = order.clone();
        updated.gateway_preference_id = Some(preference.id.clone());
        self.store.update_with_version(&updated, order.version)?;

        info!(
            order_id = %order.id,
            preference_id = %preference.id,
            "payment preference generated"
        );

        Ok(Checkout {
            preference_id: preference.id,
            redirect_url: preference.init_point,
        })
    }

    fn build_preference_request(&self, order: &Order) -> PreferenceRequest {
        let mut items: Vec<PreferenceItem> = order
            .line_items
            .iter()
            .map(|line| PreferenceItem {
                title: line.product_name.clone(),
                quantity: line.quantity,
                currency_id: self.settings.currency_id.clone(),
                unit_price: line.unit_price,
            })
            .collect();

        if let Some(adjustment) = money::preference_adjustment(&order.line_items, order.total) {
            items.push(PreferenceItem {
                title: "Order adjustment".to_string(),
                quantity: 1,
                currency_id: self.settings.currency_id.clone(),
                unit_price: money::to_f64(adjustment),
            });
        }

        let mut metadata = HashMap::new();
        metadata.insert(
            METADATA_ORDER_ID.to_string(),
            serde_json::Value::String(order.id.clone()),
        );

        PreferenceRequest {
            items,
            back_urls: self.settings.back_urls.clone(),
            notification_url: self.settings.notification_url.clone(),
            metadata,
        }
    }

    /// Load one order
    pub fn get_order(&self, order_id: &str) -> AppResult<Order> {
        self.store
            .get(order_id)?
            .ok_or_else(|| AppError::order_not_found(order_id))
    }

    /// All of a customer's orders, newest first. Unknown customers get an
    /// empty list, not an error.
    pub fn list_orders_for_customer(&self, customer_id: &str) -> AppResult<Vec<Order>> {
        Ok(self.store.list_by_customer(customer_id)?)
    }
}
