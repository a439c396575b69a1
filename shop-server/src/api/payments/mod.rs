//! Payment webhook API Module

mod handler;

use axum::{Router, routing::post};

use crate::core::ServerState;

/// Payment router
pub fn router() -> Router<ServerState> {
    Router::new().route("/api/payments/notifications", post(handler::notification))
}
