//! redb-based storage layer for orders
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `orders` | `order_id` | `Order` | Order records (JSON) |
//! | `active_by_customer` | `customer_id` | `order_id` | One-active-order guard |
//! | `customer_orders` | `customer_id` | `order_id` | Customer order listing (multimap) |
//! | `processed_payments` | `(order_id, payment_id)` | `()` | Reconciliation idempotency |
//!
//! # Concurrency
//!
//! All mutations run inside a single redb write transaction, so the
//! one-active-order check and the order insert commit atomically. Updates are
//! guarded by an optimistic version compare: the caller states the version it
//! read and the write fails with [`StoreError::VersionConflict`] when the
//! stored record has moved on.

use redb::{Database, MultimapTableDefinition, ReadableDatabase, ReadableTable, TableDefinition};
use shared::error::{AppError, ErrorCode};
use shared::models::{Order, OrderStatus, PaymentRecord};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Table for orders: key = order_id, value = JSON-serialized Order
const ORDERS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("orders");

/// Table enforcing one active order per customer: key = customer_id, value = order_id
const ACTIVE_BY_CUSTOMER_TABLE: TableDefinition<&str, &str> =
    TableDefinition::new("active_by_customer");

/// Multimap for customer order history: key = customer_id, value = order_id
const CUSTOMER_ORDERS_TABLE: MultimapTableDefinition<&str, &str> =
    MultimapTableDefinition::new("customer_orders");

/// Table for reconciled payments: key = (order_id, payment_id), value = empty (idempotency)
const PROCESSED_PAYMENTS_TABLE: TableDefinition<(&str, &str), ()> =
    TableDefinition::new("processed_payments");

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Customer {customer_id} already has active order {order_id}")]
    DuplicateActiveOrder {
        customer_id: String,
        order_id: String,
    },

    #[error("Version conflict on order {order_id}: expected {expected}, found {actual}")]
    VersionConflict {
        order_id: String,
        expected: u64,
        actual: u64,
    },

    #[error("Invalid status transition: {from:?} -> {to:?}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::OrderNotFound(id) => AppError::order_not_found(id),
            StoreError::DuplicateActiveOrder {
                customer_id,
                order_id,
            } => AppError::duplicate_active_order(customer_id).with_detail("order_id", order_id),
            StoreError::VersionConflict { order_id, .. } => AppError::version_conflict(order_id),
            StoreError::InvalidTransition { from, .. } => match from {
                OrderStatus::Paid => AppError::new(ErrorCode::OrderAlreadyPaid),
                OrderStatus::Cancelled => AppError::new(ErrorCode::OrderAlreadyCancelled),
                OrderStatus::Available => AppError::invalid_request("Invalid status transition"),
            },
            other => AppError::database(other.to_string()),
        }
    }
}

/// Result of applying a payment to an order
#[derive(Debug, Clone)]
pub struct PaymentApplied {
    /// The order after the write (unchanged when already processed)
    pub order: Order,
    /// False when the (order, payment) pair had already been reconciled
    pub newly_applied: bool,
}

/// Order storage backed by redb
#[derive(Clone)]
pub struct OrderStore {
    db: Arc<Database>,
}

impl OrderStore {
    /// Open or create the database at the given path
    ///
    /// redb commits are durable as soon as `commit()` returns and the file is
    /// always in a consistent state, so an interrupted process never leaves a
    /// half-written order behind.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let db = Database::create(path)?;
        let store = Self { db: Arc::new(db) };
        store.init_tables()?;
        Ok(store)
    }

    /// Wrap an already-open database (shared with the embedded collaborators)
    pub fn with_database(db: Arc<Database>) -> StoreResult<Self> {
        let store = Self { db };
        store.init_tables()?;
        Ok(store)
    }

    /// Open an in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> StoreResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        let store = Self { db: Arc::new(db) };
        store.init_tables()?;
        Ok(store)
    }

    fn init_tables(&self) -> StoreResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let _ = write_txn.open_table(ORDERS_TABLE)?;
            let _ = write_txn.open_table(ACTIVE_BY_CUSTOMER_TABLE)?;
            let _ = write_txn.open_multimap_table(CUSTOMER_ORDERS_TABLE)?;
            let _ = write_txn.open_table(PROCESSED_PAYMENTS_TABLE)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// The underlying database handle
    pub fn database(&self) -> Arc<Database> {
        self.db.clone()
    }

    // ========== Write Operations ==========

    /// Persist a brand-new order.
    ///
    /// The one-active-order-per-customer check and the insert happen in the
    /// same write transaction, so two concurrent creations for one customer
    /// cannot both succeed.
    pub fn insert_new(&self, order: &Order) -> StoreResult<()> {
        let write_txn = self.db.begin_write()?;
        {
            let mut active = write_txn.open_table(ACTIVE_BY_CUSTOMER_TABLE)?;
            if let Some(existing) = active.get(order.customer_id.as_str())? {
                return Err(StoreError::DuplicateActiveOrder {
                    customer_id: order.customer_id.clone(),
                    order_id: existing.value().to_string(),
                });
            }

            let bytes = serde_json::to_vec(order)?;
            let mut orders = write_txn.open_table(ORDERS_TABLE)?;
            orders.insert(order.id.as_str(), bytes.as_slice())?;

            active.insert(order.customer_id.as_str(), order.id.as_str())?;

            let mut by_customer = write_txn.open_multimap_table(CUSTOMER_ORDERS_TABLE)?;
            by_customer.insert(order.customer_id.as_str(), order.id.as_str())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Replace an order record, guarded by an optimistic version check.
    ///
    /// Writes `updated` with its version bumped past `expected_version` and
    /// keeps the active-customer index consistent with the new status.
    /// Returns the record as persisted.
    pub fn update_with_version(
        &self,
        updated: &Order,
        expected_version: u64,
    ) -> StoreResult<Order> {
        let write_txn = self.db.begin_write()?;
        let persisted = {
            let mut orders = write_txn.open_table(ORDERS_TABLE)?;
            let current = match orders.get(updated.id.as_str())? {
                Some(guard) => serde_json::from_slice::<Order>(guard.value())?,
                None => return Err(StoreError::OrderNotFound(updated.id.clone())),
            };
            if current.version != expected_version {
                return Err(StoreError::VersionConflict {
                    order_id: updated.id.clone(),
                    expected: expected_version,
                    actual: current.version,
                });
            }

            let mut record = updated.clone();
            record.version = expected_version + 1;
            let bytes = serde_json::to_vec(&record)?;
            orders.insert(record.id.as_str(), bytes.as_slice())?;

            if record.status.is_terminal() {
                let mut active = write_txn.open_table(ACTIVE_BY_CUSTOMER_TABLE)?;
                active.remove(record.customer_id.as_str())?;
            }
            record
        };
        write_txn.commit()?;
        Ok(persisted)
    }

    /// Attach a payment record, optionally transitioning the order, and mark
    /// the (order, payment) pair as processed. One transaction.
    ///
    /// The processed marker is written only when a terminal transition is
    /// applied: an attach-only update (pending payment) leaves the pair
    /// unmarked so a later settlement under the same gateway payment id can
    /// still be applied. Re-applying a settled payment is a no-op that
    /// returns the stored order with `newly_applied == false`, which is what
    /// makes at-least-once webhook delivery safe.
    pub fn apply_payment(
        &self,
        order_id: &str,
        expected_version: u64,
        record: PaymentRecord,
        new_status: Option<OrderStatus>,
    ) -> StoreResult<PaymentApplied> {
        let write_txn = self.db.begin_write()?;
        let applied = {
            let mut orders = write_txn.open_table(ORDERS_TABLE)?;
            let mut order = match orders.get(order_id)? {
                Some(guard) => serde_json::from_slice::<Order>(guard.value())?,
                None => return Err(StoreError::OrderNotFound(order_id.to_string())),
            };

            let mut processed = write_txn.open_table(PROCESSED_PAYMENTS_TABLE)?;
            let key = (order_id, record.gateway_payment_id.as_str());
            if processed.get(key)?.is_some() {
                return Ok(PaymentApplied {
                    order,
                    newly_applied: false,
                });
            }

            if order.version != expected_version {
                return Err(StoreError::VersionConflict {
                    order_id: order_id.to_string(),
                    expected: expected_version,
                    actual: order.version,
                });
            }

            if let Some(next) = new_status {
                if !order.status.can_transition_to(next) {
                    return Err(StoreError::InvalidTransition {
                        from: order.status,
                        to: next,
                    });
                }
                order.status = next;
                processed.insert(key, ())?;
            }

            order.payment = Some(record);
            order.version = expected_version + 1;

            let bytes = serde_json::to_vec(&order)?;
            orders.insert(order_id, bytes.as_slice())?;

            if order.status.is_terminal() {
                let mut active = write_txn.open_table(ACTIVE_BY_CUSTOMER_TABLE)?;
                active.remove(order.customer_id.as_str())?;
            }

            PaymentApplied {
                order,
                newly_applied: true,
            }
        };
        write_txn.commit()?;
        Ok(applied)
    }

    // ========== Read Operations ==========

    /// Load an order by id
    pub fn get(&self, order_id: &str) -> StoreResult<Option<Order>> {
        let read_txn = self.db.begin_read()?;
        let orders = read_txn.open_table(ORDERS_TABLE)?;
        match orders.get(order_id)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    /// Load an order by id, erroring when absent
    pub fn get_required(&self, order_id: &str) -> StoreResult<Order> {
        self.get(order_id)?
            .ok_or_else(|| StoreError::OrderNotFound(order_id.to_string()))
    }

    /// All orders for a customer, newest first
    pub fn list_by_customer(&self, customer_id: &str) -> StoreResult<Vec<Order>> {
        let read_txn = self.db.begin_read()?;
        let by_customer = read_txn.open_multimap_table(CUSTOMER_ORDERS_TABLE)?;
        let orders = read_txn.open_table(ORDERS_TABLE)?;

        let mut result = Vec::new();
        for entry in by_customer.get(customer_id)? {
            let id_guard = entry?;
            if let Some(guard) = orders.get(id_guard.value())? {
                result.push(serde_json::from_slice::<Order>(guard.value())?);
            }
        }
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }

    /// The customer's currently active order id, if any
    pub fn active_order_for(&self, customer_id: &str) -> StoreResult<Option<String>> {
        let read_txn = self.db.begin_read()?;
        let active = read_txn.open_table(ACTIVE_BY_CUSTOMER_TABLE)?;
        Ok(active
            .get(customer_id)?
            .map(|guard| guard.value().to_string()))
    }

    /// Whether a (order, payment) pair has already been reconciled
    pub fn is_payment_processed(&self, order_id: &str, payment_id: &str) -> StoreResult<bool> {
        let read_txn = self.db.begin_read()?;
        let processed = read_txn.open_table(PROCESSED_PAYMENTS_TABLE)?;
        Ok(processed.get((order_id, payment_id))?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use shared::models::LineItem;

    fn sample_order(id: &str, customer: &str) -> Order {
        Order {
            id: id.to_string(),
            customer_id: customer.to_string(),
            created_at: Utc::now(),
            line_items: vec![LineItem {
                product_ref: "p1".to_string(),
                product_name: "Widget".to_string(),
                unit_price: 1000.0,
                quantity: 2,
            }],
            discount: 0.0,
            tax: 0.0,
            total: 2000.0,
            coupon_code: None,
            gateway_preference_id: None,
            payment: None,
            status: OrderStatus::Available,
            version: 0,
        }
    }

    fn sample_payment(payment_id: &str) -> PaymentRecord {
        PaymentRecord {
            gateway_payment_id: payment_id.to_string(),
            currency: "COP".to_string(),
            payment_method_type: "credit_card".to_string(),
            status: "approved".to_string(),
            status_detail: "accredited".to_string(),
            authorization_code: Some("AUTH1".to_string()),
            captured_at: Some(Utc::now()),
            amount: 2000.0,
        }
    }

    #[test]
    fn test_insert_and_get() {
        let store = OrderStore::open_in_memory().unwrap();
        let order = sample_order("o1", "c1");
        store.insert_new(&order).unwrap();

        let loaded = store.get("o1").unwrap().unwrap();
        assert_eq!(loaded.customer_id, "c1");
        assert_eq!(loaded.version, 0);
        assert_eq!(store.active_order_for("c1").unwrap(), Some("o1".to_string()));
    }

    #[test]
    fn test_get_missing_returns_none() {
        let store = OrderStore::open_in_memory().unwrap();
        assert!(store.get("missing").unwrap().is_none());
        assert!(matches!(
            store.get_required("missing"),
            Err(StoreError::OrderNotFound(_))
        ));
    }

    #[test]
    fn test_duplicate_active_order_rejected() {
        let store = OrderStore::open_in_memory().unwrap();
        store.insert_new(&sample_order("o1", "c1")).unwrap();

        let err = store.insert_new(&sample_order("o2", "c1")).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateActiveOrder { .. }));

        // Other customers are unaffected
        store.insert_new(&sample_order("o3", "c2")).unwrap();
    }

    #[test]
    fn test_new_order_allowed_after_terminal() {
        let store = OrderStore::open_in_memory().unwrap();
        store.insert_new(&sample_order("o1", "c1")).unwrap();

        store
            .apply_payment("o1", 0, sample_payment("pay-1"), Some(OrderStatus::Paid))
            .unwrap();

        // Active slot is freed once the order reaches a terminal state
        assert_eq!(store.active_order_for("c1").unwrap(), None);
        store.insert_new(&sample_order("o2", "c1")).unwrap();
    }

    #[test]
    fn test_update_with_version_bumps_version() {
        let store = OrderStore::open_in_memory().unwrap();
        store.insert_new(&sample_order("o1", "c1")).unwrap();

        let mut order = store.get("o1").unwrap().unwrap();
        order.gateway_preference_id = Some("pref-1".to_string());
        let persisted = store.update_with_version(&order, 0).unwrap();
        assert_eq!(persisted.version, 1);
        assert_eq!(
            persisted.gateway_preference_id.as_deref(),
            Some("pref-1")
        );
    }

    #[test]
    fn test_update_with_stale_version_conflicts() {
        let store = OrderStore::open_in_memory().unwrap();
        store.insert_new(&sample_order("o1", "c1")).unwrap();

        let mut order = store.get("o1").unwrap().unwrap();
        order.gateway_preference_id = Some("pref-1".to_string());
        store.update_with_version(&order, 0).unwrap();

        // Second writer still holds version 0
        let err = store.update_with_version(&order, 0).unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { actual: 1, .. }));
    }

    #[test]
    fn test_apply_payment_transitions_and_marks_processed() {
        let store = OrderStore::open_in_memory().unwrap();
        store.insert_new(&sample_order("o1", "c1")).unwrap();

        let applied = store
            .apply_payment("o1", 0, sample_payment("pay-1"), Some(OrderStatus::Paid))
            .unwrap();
        assert!(applied.newly_applied);
        assert_eq!(applied.order.status, OrderStatus::Paid);
        assert_eq!(applied.order.version, 1);
        assert!(store.is_payment_processed("o1", "pay-1").unwrap());
    }

    #[test]
    fn test_apply_payment_is_idempotent() {
        let store = OrderStore::open_in_memory().unwrap();
        store.insert_new(&sample_order("o1", "c1")).unwrap();

        store
            .apply_payment("o1", 0, sample_payment("pay-1"), Some(OrderStatus::Paid))
            .unwrap();
        // Redelivery: same payment id, stale version; must no-op, not conflict
        let again = store
            .apply_payment("o1", 0, sample_payment("pay-1"), Some(OrderStatus::Paid))
            .unwrap();
        assert!(!again.newly_applied);
        assert_eq!(again.order.status, OrderStatus::Paid);
        assert_eq!(again.order.version, 1);
    }

    #[test]
    fn test_apply_payment_attach_only_keeps_order_active() {
        let store = OrderStore::open_in_memory().unwrap();
        store.insert_new(&sample_order("o1", "c1")).unwrap();

        let mut record = sample_payment("pay-1");
        record.status = "in_process".to_string();
        record.status_detail = "pending_contingency".to_string();
        let applied = store.apply_payment("o1", 0, record, None).unwrap();

        assert_eq!(applied.order.status, OrderStatus::Available);
        assert_eq!(store.active_order_for("c1").unwrap(), Some("o1".to_string()));
        // Attach-only leaves the pair unmarked: the payment may still settle
        assert!(!store.is_payment_processed("o1", "pay-1").unwrap());
    }

    #[test]
    fn test_same_payment_can_settle_after_attach_only() {
        let store = OrderStore::open_in_memory().unwrap();
        store.insert_new(&sample_order("o1", "c1")).unwrap();

        let mut pending = sample_payment("pay-1");
        pending.status = "in_process".to_string();
        store.apply_payment("o1", 0, pending, None).unwrap();

        let applied = store
            .apply_payment("o1", 1, sample_payment("pay-1"), Some(OrderStatus::Paid))
            .unwrap();
        assert!(applied.newly_applied);
        assert_eq!(applied.order.status, OrderStatus::Paid);
        assert_eq!(applied.order.version, 2);
        assert!(store.is_payment_processed("o1", "pay-1").unwrap());
    }

    #[test]
    fn test_apply_payment_rejects_terminal_transition() {
        let store = OrderStore::open_in_memory().unwrap();
        store.insert_new(&sample_order("o1", "c1")).unwrap();
        store
            .apply_payment("o1", 0, sample_payment("pay-1"), Some(OrderStatus::Paid))
            .unwrap();

        let err = store
            .apply_payment("o1", 1, sample_payment("pay-2"), Some(OrderStatus::Cancelled))
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));
    }

    #[test]
    fn test_list_by_customer_newest_first() {
        let store = OrderStore::open_in_memory().unwrap();
        let mut first = sample_order("o1", "c1");
        first.created_at = Utc::now() - chrono::Duration::minutes(5);
        store.insert_new(&first).unwrap();
        store
            .apply_payment("o1", 0, sample_payment("pay-1"), Some(OrderStatus::Paid))
            .unwrap();
        store.insert_new(&sample_order("o2", "c1")).unwrap();

        let list = store.list_by_customer("c1").unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, "o2");
        assert_eq!(list[1].id, "o1");
        assert!(store.list_by_customer("nobody").unwrap().is_empty());
    }
}
