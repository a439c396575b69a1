//! Shop Server - order lifecycle and payment reconciliation engine
//!
//! # Architecture overview
//!
//! - **Orders** (`orders`): redb-backed order store, order service and
//!   payment reconciliation
//! - **Gateway** (`gateway`): payment gateway port plus the REST adapter
//! - **Collaborators** (`collab`): catalog, cart and coupon ports with
//!   embedded implementations
//! - **HTTP API** (`api`): RESTful API surface
//!
//! # Module structure
//!
//! ```text
//! shop-server/src/
//! ├── core/          # Configuration, state, bootstrap
//! ├── api/           # HTTP routes and handlers
//! ├── orders/        # Order store, service, reconciliation, money
//! ├── gateway/       # Payment gateway port + HTTP adapter
//! ├── collab/        # Catalog, cart, coupon collaborators
//! └── utils/         # Logging and shared re-exports
//! ```

pub mod api;
pub mod collab;
pub mod core;
pub mod gateway;
pub mod orders;
pub mod utils;

// Re-export common types
pub use core::{Config, Server, ServerState};
pub use gateway::{GatewayEvent, PaymentGateway};
pub use orders::{OrderService, OrderStore, PaymentReconciler};
pub use utils::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};

/// Load .env and initialize logging from LOG_LEVEL / LOG_DIR
pub fn setup_environment() {
    dotenv::dotenv().ok();

    let level = std::env::var("LOG_LEVEL").ok();
    let log_dir = std::env::var("LOG_DIR").ok();
    init_logger_with_file(level.as_deref(), log_dir.as_deref());
}
