//! Payment webhook handler

use axum::{
    Json,
    extract::State,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::core::ServerState;
use shared::error::ApiResponse;

/// Receive a gateway payment notification.
///
/// A 200 acknowledges the notification. Any error status tells the gateway
/// to redeliver later, which is how transient failures (order not yet
/// visible, gateway fetch failed) get retried. The gateway only ever sees
/// the bare failure status; error detail stays in the server log.
pub async fn notification(
    State(state): State<ServerState>,
    Json(body): Json<serde_json::Value>,
) -> Response {
    match state.reconciler.handle_notification(&body).await {
        Ok(()) => Json(ApiResponse::ok()).into_response(),
        Err(err) => {
            warn!(code = %err.code, error = %err, "payment notification processing failed");
            err.http_status().into_response()
        }
    }
}
