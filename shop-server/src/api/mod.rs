//! API routes
//!
//! # Structure
//!
//! - [`health`] - health check
//! - [`orders`] - order creation, lookup and checkout preferences
//! - [`payments`] - gateway webhook endpoint

pub mod health;
pub mod orders;
pub mod payments;

use crate::core::ServerState;
use axum::Router;
use tower_http::trace::TraceLayer;

/// Full application router
pub fn router(state: ServerState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(orders::router())
        .merge(payments::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
