//! Shared server state
//!
//! Wires the order store, the payment gateway client, the embedded
//! collaborators and the services into one cloneable handle the API layer
//! extracts via axum state.

use crate::collab::{EmbeddedCartStore, EmbeddedCatalog, EmbeddedCouponStore};
use crate::core::config::Config;
use crate::gateway::{HttpPaymentGateway, PaymentGateway};
use crate::orders::{OrderService, OrderStore, PaymentReconciler};
use shared::error::{AppError, AppResult};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

const DB_FILE: &str = "shop.redb";

#[derive(Clone)]
pub struct ServerState {
    pub config: Arc<Config>,
    pub store: OrderStore,
    pub orders: Arc<OrderService>,
    pub reconciler: Arc<PaymentReconciler>,
    pub catalog: Arc<EmbeddedCatalog>,
    pub cart: Arc<EmbeddedCartStore>,
    pub coupons: Arc<EmbeddedCouponStore>,
}

impl ServerState {
    /// Open the database under the configured work directory and wire
    /// everything against the real HTTP payment gateway
    pub fn initialize(config: Config) -> AppResult<Self> {
        std::fs::create_dir_all(&config.work_dir)
            .map_err(|e| AppError::internal(format!("create work dir: {}", e)))?;

        let db_path = Path::new(&config.work_dir).join(DB_FILE);
        let store = OrderStore::open(&db_path)?;
        info!(path = %db_path.display(), "order database opened");

        let gateway: Arc<dyn PaymentGateway> = Arc::new(HttpPaymentGateway::new(
            config.gateway_base_url.clone(),
            config.gateway_access_token.clone(),
            config.gateway_timeout(),
            config.gateway_retry_policy(),
        )?);

        Self::assemble(config, store, gateway)
    }

    /// Wire services around an existing store and gateway. Tests use this
    /// to substitute a gateway double.
    pub fn assemble(
        config: Config,
        store: OrderStore,
        gateway: Arc<dyn PaymentGateway>,
    ) -> AppResult<Self> {
        let db = store.database();
        let catalog = Arc::new(EmbeddedCatalog::new(db.clone())?);
        let cart = Arc::new(EmbeddedCartStore::new(db.clone())?);
        let coupons = Arc::new(EmbeddedCouponStore::new(db)?);

        let orders = Arc::new(OrderService::new(
            store.clone(),
            gateway.clone(),
            cart.clone(),
            coupons.clone(),
            config.checkout_settings(),
        ));
        let reconciler = Arc::new(PaymentReconciler::new(
            store.clone(),
            gateway,
            catalog.clone(),
        ));

        Ok(Self {
            config: Arc::new(config),
            store,
            orders,
            reconciler,
            catalog,
            cart,
            coupons,
        })
    }
}
