//! Payment notification reconciliation
//!
//! Webhook bodies are hints, not facts: the reconciler extracts a payment id,
//! fetches the authoritative payment resource from the gateway, and applies
//! the result to the order.
//!
//! Delivery is at least once, so every step is idempotent:
//! 1. the stock decrement commits a per-order marker in the same transaction
//!    as the decrements, and
//! 2. the order update commits the (order, payment) processed marker together
//!    with the payment record whenever a terminal transition is applied.
//!    Attach-only updates (pending payments) leave the pair unmarked, so the
//!    same payment id can still settle the order on a later notification.
//!
//! A crash between the two steps is healed by the gateway's redelivery: the
//! decrement no-ops on the marker and the order update runs to completion.
//! Errors (unknown order, gateway unreachable) propagate so the webhook
//! endpoint answers non-2xx and the gateway retries later.

use crate::collab::ProductCatalog;
use crate::gateway::{GatewayEvent, GatewayPayment, PaymentGateway};
use crate::orders::money;
use crate::orders::store::OrderStore;
use shared::error::{AppError, AppResult, ErrorCode};
use shared::models::{OrderStatus, PaymentRecord};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Reconciles gateway payment notifications against stored orders
pub struct PaymentReconciler {
    store: OrderStore,
    gateway: Arc<dyn PaymentGateway>,
    catalog: Arc<dyn ProductCatalog>,
}

impl PaymentReconciler {
    pub fn new(
        store: OrderStore,
        gateway: Arc<dyn PaymentGateway>,
        catalog: Arc<dyn ProductCatalog>,
    ) -> Self {
        Self {
            store,
            gateway,
            catalog,
        }
    }

    /// Process one webhook body. `Ok(())` acknowledges the notification;
    /// errors tell the gateway to redeliver.
    pub async fn handle_notification(&self, body: &serde_json::Value) -> AppResult<()> {
        match GatewayEvent::parse(body) {
            GatewayEvent::Payment { payment_id } => self.reconcile_payment(&payment_id).await,
            GatewayEvent::Unknown => {
                debug!("ignoring non-payment notification");
                Ok(())
            }
        }
    }

    async fn reconcile_payment(&self, payment_id: &str) -> AppResult<()> {
        let payment = self.gateway.get_payment(payment_id).await?;

        let order_id = payment.order_id().ok_or_else(|| {
            AppError::new(ErrorCode::PaymentMetadataMissing).with_detail("payment_id", payment_id)
        })?;

        // Unknown order is an error on purpose: creation may still be
        // in flight and the gateway's retry gives it time to land.
        let order = self
            .store
            .get(&order_id)?
            .ok_or_else(|| AppError::order_not_found(order_id.clone()))?;

        if self.store.is_payment_processed(&order_id, &payment.id)? {
            info!(
                order_id = %order_id,
                payment_id = %payment.id,
                "duplicate notification, already reconciled"
            );
            return Ok(());
        }

        if order.status.is_terminal() {
            warn!(
                order_id = %order_id,
                payment_id = %payment.id,
                status = ?order.status,
                "payment notification for settled order, acknowledging without changes"
            );
            return Ok(());
        }

        if !money::money_eq(payment.transaction_amount, order.total) {
            warn!(
                order_id = %order_id,
                payment_id = %payment.id,
                paid = payment.transaction_amount,
                expected = order.total,
                "payment amount differs from order total"
            );
        }

        let new_status = match payment.status.as_str() {
            "approved" => Some(OrderStatus::Paid),
            "rejected" => Some(OrderStatus::Cancelled),
            _ => None,
        };

        // Inventory first: the per-order marker makes this exactly-once even
        // when the order update below fails and the gateway redelivers.
        if new_status == Some(OrderStatus::Paid) {
            self.catalog
                .decrement_stock_for_order(&order_id, &order.line_items)
                .await?;
        }

        let record = build_record(&payment);
        let applied = self
            .store
            .apply_payment(&order_id, order.version, record, new_status)?;

        info!(
            order_id = %order_id,
            payment_id = %payment.id,
            payment_status = %payment.status,
            order_status = ?applied.order.status,
            newly_applied = applied.newly_applied,
            "payment reconciled"
        );
        Ok(())
    }
}

fn build_record(payment: &GatewayPayment) -> PaymentRecord {
    PaymentRecord {
        gateway_payment_id: payment.id.clone(),
        currency: payment.currency_id.clone(),
        payment_method_type: payment.payment_type_id.clone(),
        status: payment.status.clone(),
        status_detail: payment.status_detail.clone(),
        authorization_code: payment.authorization_code.clone(),
        captured_at: payment.date_created,
        amount: payment.transaction_amount,
    }
}
