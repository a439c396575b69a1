//! Cart port and embedded implementation
//!
//! The order core only ever clears a cart, and only as a best-effort side
//! effect after an order is created. The embedded store keeps one JSON blob
//! per customer on the shared redb database.

use async_trait::async_trait;
use redb::{Database, ReadableDatabase, TableDefinition};
use serde::{Deserialize, Serialize};
use shared::error::{AppError, AppResult};
use std::sync::Arc;

/// Table for carts: key = customer_id, value = JSON-serialized Vec<CartEntry>
const CARTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("carts");

/// One cart line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CartEntry {
    pub product_ref: String,
    pub quantity: i32,
}

/// Cart port
#[async_trait]
pub trait CartService: Send + Sync {
    /// Remove the customer's cart after an order has been created
    async fn clear_cart(&self, customer_id: &str) -> AppResult<()>;
}

/// Cart store backed by the shared redb database
#[derive(Clone)]
pub struct EmbeddedCartStore {
    db: Arc<Database>,
}

impl EmbeddedCartStore {
    pub fn new(db: Arc<Database>) -> AppResult<Self> {
        let store = Self { db };
        let write_txn = store.db.begin_write().map_err(db_err)?;
        {
            let _ = write_txn.open_table(CARTS_TABLE).map_err(db_err)?;
        }
        write_txn.commit().map_err(db_err)?;
        Ok(store)
    }

    pub fn put_cart(&self, customer_id: &str, entries: &[CartEntry]) -> AppResult<()> {
        let bytes = serde_json::to_vec(entries)
            .map_err(|e| AppError::internal(format!("serialize cart: {}", e)))?;
        let write_txn = self.db.begin_write().map_err(db_err)?;
        {
            let mut carts = write_txn.open_table(CARTS_TABLE).map_err(db_err)?;
            carts.insert(customer_id, bytes.as_slice()).map_err(db_err)?;
        }
        write_txn.commit().map_err(db_err)?;
        Ok(())
    }

    pub fn get_cart(&self, customer_id: &str) -> AppResult<Option<Vec<CartEntry>>> {
        let read_txn = self.db.begin_read().map_err(db_err)?;
        let carts = read_txn.open_table(CARTS_TABLE).map_err(db_err)?;
        match carts.get(customer_id).map_err(db_err)? {
            Some(guard) => Ok(Some(
                serde_json::from_slice(guard.value())
                    .map_err(|e| AppError::internal(format!("corrupt cart record: {}", e)))?,
            )),
            None => Ok(None),
        }
    }
}

fn db_err(err: impl std::fmt::Display) -> AppError {
    AppError::database(err.to_string())
}

#[async_trait]
impl CartService for EmbeddedCartStore {
    async fn clear_cart(&self, customer_id: &str) -> AppResult<()> {
        let write_txn = self.db.begin_write().map_err(db_err)?;
        {
            let mut carts = write_txn.open_table(CARTS_TABLE).map_err(db_err)?;
            carts.remove(customer_id).map_err(db_err)?;
        }
        write_txn.commit().map_err(db_err)?;
        Ok(())
    }
}
