//! REST adapter for the payment gateway
//!
//! Talks to the gateway's HTTP API directly with reqwest rather than through
//! an SDK. Every call carries a bearer token, runs under a per-request
//! timeout, and is wrapped in the bounded-backoff retry executor. Server-side
//! failures (5xx, 429) and transport errors are treated as transient;
//! gateway rejections (other 4xx) are not.

use super::retry::{RetryPolicy, retry_with_policy};
use super::{GatewayPayment, PaymentGateway, Preference, PreferenceRequest};
use async_trait::async_trait;
use reqwest::StatusCode;
use shared::error::{AppError, AppResult, ErrorCode};
use std::time::Duration;
use tracing::debug;

/// HTTP payment gateway client
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
    policy: RetryPolicy,
}

impl HttpPaymentGateway {
    pub fn new(
        base_url: impl Into<String>,
        access_token: impl Into<String>,
        request_timeout: Duration,
        policy: RetryPolicy,
    ) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| {
                AppError::with_message(ErrorCode::ConfigError, format!("http client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
            policy,
        })
    }

    fn map_transport_error(err: reqwest::Error, operation: &str) -> AppError {
        if err.is_timeout() {
            AppError::gateway_timeout(format!("{} timed out: {}", operation, err))
        } else if err.is_connect() {
            AppError::with_message(
                ErrorCode::NetworkError,
                format!("{} connection failed: {}", operation, err),
            )
        } else {
            AppError::gateway(format!("{} failed: {}", operation, err))
        }
    }

    async fn fail_from_response(
        response: reqwest::Response,
        operation: &str,
    ) -> AppError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let snippet: String = body.chars().take(300).collect();

        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            AppError::gateway(format!("{} returned {}: {}", operation, status, snippet))
        } else {
            // Gateway rejected the request; retrying would not help
            AppError::with_message(
                ErrorCode::InvalidRequest,
                format!("{} rejected with {}: {}", operation, status, snippet),
            )
            .with_detail("status", status.as_u16())
        }
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_preference(&self, request: &PreferenceRequest) -> AppResult<Preference> {
        let url = format!("{}/checkout/preferences", self.base_url);

        retry_with_policy(&self.policy, "create_preference", || {
            let url = url.clone();
            async move {
                let response = self
                    .client
                    .post(&url)
                    .bearer_auth(&self.access_token)
                    .json(request)
                    .send()
                    .await
                    .map_err(|e| Self::map_transport_error(e, "create_preference"))?;

                if !response.status().is_success() {
                    return Err(Self::fail_from_response(response, "create_preference").await);
                }

                let preference: Preference = response.json().await.map_err(|e| {
                    AppError::gateway(format!("create_preference invalid body: {}", e))
                })?;
                debug!(preference_id = %preference.id, "payment preference created");
                Ok(preference)
            }
        })
        .await
    }

    async fn get_payment(&self, payment_id: &str) -> AppResult<GatewayPayment> {
        let url = format!("{}/v1/payments/{}", self.base_url, payment_id);

        retry_with_policy(&self.policy, "get_payment", || {
            let url = url.clone();
            async move {
                let response = self
                    .client
                    .get(&url)
                    .bearer_auth(&self.access_token)
                    .send()
                    .await
                    .map_err(|e| Self::map_transport_error(e, "get_payment"))?;

                if response.status() == StatusCode::NOT_FOUND {
                    return Err(AppError::new(ErrorCode::PaymentNotFound)
                        .with_detail("payment_id", payment_id));
                }
                if !response.status().is_success() {
                    return Err(Self::fail_from_response(response, "get_payment").await);
                }

                response
                    .json::<GatewayPayment>()
                    .await
                    .map_err(|e| AppError::gateway(format!("get_payment invalid body: {}", e)))
            }
        })
        .await
    }
}
