use crate::gateway::{BackUrls, RetryPolicy};
use crate::orders::CheckoutSettings;
use std::time::Duration;

/// Server configuration
///
/// # Environment variables
///
/// | Variable | Default | Purpose |
/// |----------|---------|---------|
/// | WORK_DIR | /var/lib/shop-server | Working directory (database, logs) |
/// | HTTP_PORT | 3000 | HTTP API port |
/// | ENVIRONMENT | development | Runtime environment |
/// | CURRENCY_ID | COP | Currency the shop charges in |
/// | GATEWAY_BASE_URL | https://api.mercadopago.com | Payment gateway API root |
/// | GATEWAY_ACCESS_TOKEN | (empty) | Gateway bearer token |
/// | GATEWAY_NOTIFICATION_URL | http://localhost:3000/api/payments/notifications | Webhook callback URL |
/// | BACK_URL_SUCCESS | http://localhost:3000/checkout/success | Buyer redirect on success |
/// | BACK_URL_FAILURE | http://localhost:3000/checkout/failure | Buyer redirect on failure |
/// | BACK_URL_PENDING | http://localhost:3000/checkout/pending | Buyer redirect while pending |
/// | GATEWAY_TIMEOUT_MS | 10000 | Per-request gateway timeout |
/// | GATEWAY_MAX_RETRIES | 3 | Retry budget for transient gateway failures |
/// | LOG_DIR | (unset) | When set, also log to daily rolling files |
///
/// # Example
///
/// ```ignore
/// WORK_DIR=/data/shop HTTP_PORT=8080 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// Working directory holding the database and log files
    pub work_dir: String,
    /// HTTP API port
    pub http_port: u16,
    /// Runtime environment: development | staging | production
    pub environment: String,

    // === Payment gateway ===
    pub currency_id: String,
    pub gateway_base_url: String,
    pub gateway_access_token: String,
    pub gateway_notification_url: String,
    pub back_url_success: String,
    pub back_url_failure: String,
    pub back_url_pending: String,
    /// Per-request gateway timeout (milliseconds)
    pub gateway_timeout_ms: u64,
    /// Retry budget for transient gateway failures
    pub gateway_max_retries: u32,

    /// Directory for rolling log files; stderr-only when unset
    pub log_dir: Option<String>,
}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "/var/lib/shop-server".into()),
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),

            currency_id: std::env::var("CURRENCY_ID").unwrap_or_else(|_| "COP".into()),
            gateway_base_url: std::env::var("GATEWAY_BASE_URL")
                .unwrap_or_else(|_| "https://api.mercadopago.com".into()),
            gateway_access_token: std::env::var("GATEWAY_ACCESS_TOKEN").unwrap_or_default(),
            gateway_notification_url: std::env::var("GATEWAY_NOTIFICATION_URL")
                .unwrap_or_else(|_| "http://localhost:3000/api/payments/notifications".into()),
            back_url_success: std::env::var("BACK_URL_SUCCESS")
                .unwrap_or_else(|_| "http://localhost:3000/checkout/success".into()),
            back_url_failure: std::env::var("BACK_URL_FAILURE")
                .unwrap_or_else(|_| "http://localhost:3000/checkout/failure".into()),
            back_url_pending: std::env::var("BACK_URL_PENDING")
                .unwrap_or_else(|_| "http://localhost:3000/checkout/pending".into()),
            gateway_timeout_ms: std::env::var("GATEWAY_TIMEOUT_MS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(10000),
            gateway_max_retries: std::env::var("GATEWAY_MAX_RETRIES")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3),

            log_dir: std::env::var("LOG_DIR").ok(),
        }
    }

    /// Override the bits tests care about
    pub fn with_overrides(work_dir: impl Into<String>, http_port: u16) -> Self {
        let mut config = Self::from_env();
        config.work_dir = work_dir.into();
        config.http_port = http_port;
        config
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Checkout settings handed to the order service
    pub fn checkout_settings(&self) -> CheckoutSettings {
        CheckoutSettings {
            currency_id: self.currency_id.clone(),
            notification_url: self.gateway_notification_url.clone(),
            back_urls: BackUrls {
                success: self.back_url_success.clone(),
                failure: self.back_url_failure.clone(),
                pending: self.back_url_pending.clone(),
            },
        }
    }

    /// Retry policy for gateway calls
    pub fn gateway_retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.gateway_max_retries,
            ..RetryPolicy::default()
        }
    }

    /// Per-request gateway timeout
    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_millis(self.gateway_timeout_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
