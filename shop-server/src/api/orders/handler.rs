//! Order API Handlers

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::core::ServerState;
use crate::orders::{Checkout, CreateOrder};
use shared::error::AppResult;
use shared::models::Order;

/// Create an order from a cart snapshot
pub async fn create(
    State(state): State<ServerState>,
    Json(payload): Json<CreateOrder>,
) -> AppResult<(StatusCode, Json<Order>)> {
    let order = state.orders.create_order(payload).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// Get order by id
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<Order>> {
    let order = state.orders.get_order(&id)?;
    Ok(Json(order))
}

/// Generate (or regenerate) the payment preference for an order
pub async fn create_preference(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<Checkout>> {
    let checkout = state.orders.generate_payment_preference(&id).await?;
    Ok(Json(checkout))
}

/// List a customer's orders, newest first
pub async fn list_for_customer(
    State(state): State<ServerState>,
    Path(customer_id): Path<String>,
) -> AppResult<Json<Vec<Order>>> {
    let orders = state.orders.list_orders_for_customer(&customer_id)?;
    Ok(Json(orders))
}
