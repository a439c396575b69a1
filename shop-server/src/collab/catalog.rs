//! Product catalog port and embedded implementation
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `products` | `reference` | `Product` | Catalog records (JSON) |
//! | `stock_applied` | `order_id` | `()` | Per-order decrement marker |
//!
//! Stock decrements are keyed by order: the marker is committed in the same
//! transaction as the decrements, so re-running the decrement for an order
//! (webhook redelivery, crash between reconciliation steps) is a no-op. That
//! is what keeps inventory exactly-once under at-least-once notification
//! delivery.

use async_trait::async_trait;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use shared::error::{AppError, AppResult};
use shared::models::{LineItem, Product};
use std::sync::Arc;
use tracing::warn;

/// Table for products: key = reference, value = JSON-serialized Product
const PRODUCTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("products");

/// Table marking orders whose stock decrement already ran: key = order_id
const STOCK_APPLIED_TABLE: TableDefinition<&str, ()> = TableDefinition::new("stock_applied");

/// Product catalog port
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Look up a product by its catalog reference
    async fn get_product(&self, reference: &str) -> AppResult<Option<Product>>;

    /// Decrement stock for every line of a paid order, exactly once per
    /// order. Returns false when the decrement had already been applied.
    async fn decrement_stock_for_order(
        &self,
        order_id: &str,
        items: &[LineItem],
    ) -> AppResult<bool>;
}

/// Catalog backed by the shared redb database
#[derive(Clone)]
pub struct EmbeddedCatalog {
    db: Arc<Database>,
}

impl EmbeddedCatalog {
    pub fn new(db: Arc<Database>) -> AppResult<Self> {
        let catalog = Self { db };
        catalog.init_tables()?;
        Ok(catalog)
    }

    fn init_tables(&self) -> AppResult<()> {
        let write_txn = self.db.begin_write().map_err(db_err)?;
        {
            let _ = write_txn.open_table(PRODUCTS_TABLE).map_err(db_err)?;
            let _ = write_txn.open_table(STOCK_APPLIED_TABLE).map_err(db_err)?;
        }
        write_txn.commit().map_err(db_err)?;
        Ok(())
    }

    /// Insert or replace a catalog record
    pub fn upsert_product(&self, product: &Product) -> AppResult<()> {
        let bytes = serde_json::to_vec(product)
            .map_err(|e| AppError::internal(format!("serialize product: {}", e)))?;
        let write_txn = self.db.begin_write().map_err(db_err)?;
        {
            let mut products = write_txn.open_table(PRODUCTS_TABLE).map_err(db_err)?;
            products
                .insert(product.reference.as_str(), bytes.as_slice())
                .map_err(db_err)?;
        }
        write_txn.commit().map_err(db_err)?;
        Ok(())
    }

    /// Whether the decrement for an order has already run
    pub fn stock_applied(&self, order_id: &str) -> AppResult<bool> {
        let read_txn = self.db.begin_read().map_err(db_err)?;
        let applied = read_txn.open_table(STOCK_APPLIED_TABLE).map_err(db_err)?;
        Ok(applied.get(order_id).map_err(db_err)?.is_some())
    }
}

fn db_err(err: impl std::fmt::Display) -> AppError {
    AppError::database(err.to_string())
}

#[async_trait]
impl ProductCatalog for EmbeddedCatalog {
    async fn get_product(&self, reference: &str) -> AppResult<Option<Product>> {
        let read_txn = self.db.begin_read().map_err(db_err)?;
        let products = read_txn.open_table(PRODUCTS_TABLE).map_err(db_err)?;
        match products.get(reference).map_err(db_err)? {
            Some(guard) => Ok(Some(
                serde_json::from_slice(guard.value())
                    .map_err(|e| AppError::internal(format!("corrupt product record: {}", e)))?,
            )),
            None => Ok(None),
        }
    }

    async fn decrement_stock_for_order(
        &self,
        order_id: &str,
        items: &[LineItem],
    ) -> AppResult<bool> {
        let write_txn = self.db.begin_write().map_err(db_err)?;
        let applied = {
            let mut marker = write_txn.open_table(STOCK_APPLIED_TABLE).map_err(db_err)?;
            if marker.get(order_id).map_err(db_err)?.is_some() {
                return Ok(false);
            }
            marker.insert(order_id, ()).map_err(db_err)?;

            let mut products = write_txn.open_table(PRODUCTS_TABLE).map_err(db_err)?;
            for item in items {
                let current = match products.get(item.product_ref.as_str()).map_err(db_err)? {
                    Some(guard) => Some(
                        serde_json::from_slice::<Product>(guard.value()).map_err(|e| {
                            AppError::internal(format!("corrupt product record: {}", e))
                        })?,
                    ),
                    None => None,
                };

                match current {
                    Some(mut product) => {
                        product.stock -= item.quantity;
                        if product.stock < 0 {
                            // Oversold: keep the negative count visible
                            // instead of failing the reconciliation
                            warn!(
                                order_id,
                                product_ref = %item.product_ref,
                                stock = product.stock,
                                "stock went negative"
                            );
                        }
                        let bytes = serde_json::to_vec(&product)
                            .map_err(|e| AppError::internal(format!("serialize product: {}", e)))?;
                        products
                            .insert(product.reference.as_str(), bytes.as_slice())
                            .map_err(db_err)?;
                    }
                    None => {
                        // Snapshot may reference a product removed since
                        warn!(
                            order_id,
                            product_ref = %item.product_ref,
                            "product missing from catalog, skipping decrement"
                        );
                    }
                }
            }
            true
        };
        write_txn.commit().map_err(db_err)?;
        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn in_memory_db() -> Arc<Database> {
        Arc::new(
            Database::builder()
                .create_with_backend(redb::backends::InMemoryBackend::new())
                .unwrap(),
        )
    }

    fn product(reference: &str, stock: i32) -> Product {
        Product {
            reference: reference.to_string(),
            name: format!("Product {}", reference),
            price: 100.0,
            image_url: None,
            category: None,
            stock,
        }
    }

    fn line(product_ref: &str, quantity: i32) -> LineItem {
        LineItem {
            product_ref: product_ref.to_string(),
            product_name: product_ref.to_string(),
            unit_price: 100.0,
            quantity,
        }
    }

    #[tokio::test]
    async fn test_decrement_applies_once() {
        let catalog = EmbeddedCatalog::new(in_memory_db()).unwrap();
        catalog.upsert_product(&product("p1", 10)).unwrap();

        let items = vec![line("p1", 3)];
        assert!(catalog.decrement_stock_for_order("o1", &items).await.unwrap());
        assert_eq!(catalog.get_product("p1").await.unwrap().unwrap().stock, 7);

        // Redelivery: marker short-circuits, stock untouched
        assert!(!catalog.decrement_stock_for_order("o1", &items).await.unwrap());
        assert_eq!(catalog.get_product("p1").await.unwrap().unwrap().stock, 7);
        assert!(catalog.stock_applied("o1").unwrap());
    }

    #[tokio::test]
    async fn test_decrement_distinct_orders() {
        let catalog = EmbeddedCatalog::new(in_memory_db()).unwrap();
        catalog.upsert_product(&product("p1", 10)).unwrap();

        catalog
            .decrement_stock_for_order("o1", &[line("p1", 2)])
            .await
            .unwrap();
        catalog
            .decrement_stock_for_order("o2", &[line("p1", 5)])
            .await
            .unwrap();
        assert_eq!(catalog.get_product("p1").await.unwrap().unwrap().stock, 3);
    }

    #[tokio::test]
    async fn test_decrement_missing_product_is_skipped() {
        let catalog = EmbeddedCatalog::new(in_memory_db()).unwrap();
        catalog.upsert_product(&product("p1", 5)).unwrap();

        let items = vec![line("p1", 1), line("ghost", 4)];
        assert!(catalog.decrement_stock_for_order("o1", &items).await.unwrap());
        assert_eq!(catalog.get_product("p1").await.unwrap().unwrap().stock, 4);
        assert!(catalog.get_product("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_oversell_goes_negative() {
        let catalog = EmbeddedCatalog::new(in_memory_db()).unwrap();
        catalog.upsert_product(&product("p1", 2)).unwrap();

        catalog
            .decrement_stock_for_order("o1", &[line("p1", 5)])
            .await
            .unwrap();
        assert_eq!(catalog.get_product("p1").await.unwrap().unwrap().stock, -3);
    }
}
