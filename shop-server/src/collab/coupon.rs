//! Coupon port and embedded implementation
//!
//! Discount amounts are computed upstream of order creation; the order core
//! only registers a usage once an order carrying a coupon code is persisted.
//! Registration is best-effort from the caller's point of view.

use async_trait::async_trait;
use chrono::Utc;
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use shared::error::{AppError, AppResult, ErrorCode};
use shared::models::Coupon;
use std::sync::Arc;

/// Table for coupons: key = code, value = JSON-serialized Coupon
const COUPONS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("coupons");

/// Coupon port
#[async_trait]
pub trait CouponService: Send + Sync {
    /// Record one usage of a coupon
    async fn register_usage(&self, code: &str) -> AppResult<()>;
}

/// Coupon store backed by the shared redb database
#[derive(Clone)]
pub struct EmbeddedCouponStore {
    db: Arc<Database>,
}

impl EmbeddedCouponStore {
    pub fn new(db: Arc<Database>) -> AppResult<Self> {
        let store = Self { db };
        let write_txn = store.db.begin_write().map_err(db_err)?;
        {
            let _ = write_txn.open_table(COUPONS_TABLE).map_err(db_err)?;
        }
        write_txn.commit().map_err(db_err)?;
        Ok(store)
    }

    pub fn upsert_coupon(&self, coupon: &Coupon) -> AppResult<()> {
        let bytes = serde_json::to_vec(coupon)
            .map_err(|e| AppError::internal(format!("serialize coupon: {}", e)))?;
        let write_txn = self.db.begin_write().map_err(db_err)?;
        {
            let mut coupons = write_txn.open_table(COUPONS_TABLE).map_err(db_err)?;
            coupons
                .insert(coupon.code.as_str(), bytes.as_slice())
                .map_err(db_err)?;
        }
        write_txn.commit().map_err(db_err)?;
        Ok(())
    }

    pub fn get_coupon(&self, code: &str) -> AppResult<Option<Coupon>> {
        let read_txn = self.db.begin_read().map_err(db_err)?;
        let coupons = read_txn.open_table(COUPONS_TABLE).map_err(db_err)?;
        match coupons.get(code).map_err(db_err)? {
            Some(guard) => Ok(Some(
                serde_json::from_slice(guard.value())
                    .map_err(|e| AppError::internal(format!("corrupt coupon record: {}", e)))?,
            )),
            None => Ok(None),
        }
    }
}

fn db_err(err: impl std::fmt::Display) -> AppError {
    AppError::database(err.to_string())
}

#[async_trait]
impl CouponService for EmbeddedCouponStore {
    async fn register_usage(&self, code: &str) -> AppResult<()> {
        let write_txn = self.db.begin_write().map_err(db_err)?;
        {
            let mut coupons = write_txn.open_table(COUPONS_TABLE).map_err(db_err)?;
            let mut coupon = match coupons.get(code).map_err(db_err)? {
                Some(guard) => serde_json::from_slice::<Coupon>(guard.value())
                    .map_err(|e| AppError::internal(format!("corrupt coupon record: {}", e)))?,
                None => {
                    return Err(AppError::new(ErrorCode::CouponNotFound)
                        .with_detail("code", code));
                }
            };

            if let Some(expires_at) = coupon.expires_at {
                if expires_at < Utc::now() {
                    return Err(AppError::new(ErrorCode::CouponExpired)
                        .with_detail("code", code));
                }
            }

            if let Some(remaining) = coupon.remaining_uses {
                if remaining == 0 {
                    return Err(AppError::new(ErrorCode::CouponExhausted)
                        .with_detail("code", code));
                }
                coupon.remaining_uses = Some(remaining - 1);
            }

            let bytes = serde_json::to_vec(&coupon)
                .map_err(|e| AppError::internal(format!("serialize coupon: {}", e)))?;
            coupons.insert(code, bytes.as_slice()).map_err(db_err)?;
        }
        write_txn.commit().map_err(db_err)?;
        Ok(())
    }
}
