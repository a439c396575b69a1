//! HTTP status code mapping for error codes

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    /// Get the appropriate HTTP status code for this error code
    pub fn http_status(&self) -> StatusCode {
        match self {
            // Success
            Self::Success => StatusCode::OK,

            // 404 Not Found
            Self::NotFound
            | Self::OrderNotFound
            | Self::ProductNotFound
            | Self::CouponNotFound
            | Self::CartNotFound => StatusCode::NOT_FOUND,

            // 409 Conflict
            Self::AlreadyExists
            | Self::OrderAlreadyPaid
            | Self::OrderAlreadyCancelled
            | Self::DuplicateActiveOrder
            | Self::OrderVersionConflict => StatusCode::CONFLICT,

            // 422 Unprocessable Entity (reconcilable only with gateway help)
            Self::PaymentMetadataMissing => StatusCode::UNPROCESSABLE_ENTITY,

            // 502 Bad Gateway (upstream payment gateway failure)
            Self::PaymentGatewayError | Self::PaymentNotFound => StatusCode::BAD_GATEWAY,

            // 504 Gateway Timeout
            Self::PaymentGatewayTimeout => StatusCode::GATEWAY_TIMEOUT,

            // 503 Service Unavailable (transient errors, client can retry)
            Self::NetworkError | Self::TimeoutError => StatusCode::SERVICE_UNAVAILABLE,

            // 500 Internal Server Error
            Self::InternalError | Self::DatabaseError | Self::ConfigError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }

            // 400 Bad Request (default for validation/business errors)
            _ => StatusCode::BAD_REQUEST,
        }
    }
}
