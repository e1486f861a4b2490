//! Gateway Configuration
//!
//! Read once at startup and shared read-only afterwards.

use std::time::Duration;

use crate::error::{PaymentError, Result};

pub const DEFAULT_BASE_URL: &str = "https://pay.pingpay.io";
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Settlement asset descriptor sent with every session
pub const ASSET_CHAIN: &str = "NEAR";
pub const ASSET_SYMBOL: &str = "wNEAR";
pub const RECIPIENT_CHAIN_ID: &str = "near-mainnet";

/// PingPay gateway settings
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    /// Gateway base URL, no trailing slash
    pub base_url: String,

    /// Static API key sent as `x-api-key`
    pub api_key: String,

    /// Address that receives settlement
    pub recipient_address: String,

    /// Shared secret for webhook HMACs. `None` rejects every webhook.
    pub webhook_secret: Option<String>,

    /// Public storefront URL used for success/cancel redirects
    pub app_url: String,

    /// Per-request HTTP timeout
    pub timeout: Duration,
}

impl GatewayConfig {
    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let api_key = required("PINGPAY_API_KEY")?;
        let recipient_address = required("PINGPAY_RECIPIENT_ADDRESS")?;
        let app_url = required("APP_URL")?;
        let webhook_secret = std::env::var("PINGPAY_WEBHOOK_SECRET")
            .ok()
            .filter(|s| !s.is_empty());
        let base_url = std::env::var("PINGPAY_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.into());
        let timeout_secs = std::env::var("PINGPAY_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            recipient_address,
            webhook_secret,
            app_url: app_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Redirect after payment. `{sessionId}` is substituted by the gateway.
    pub fn success_url(&self) -> String {
        format!("{}/payment/status?session_id={{sessionId}}", self.app_url)
    }

    /// Redirect back to the book page when checkout is abandoned
    pub fn cancel_url(&self, slug: &str) -> String {
        format!("{}/store/{}", self.app_url, slug)
    }
}

fn required(name: &str) -> Result<String> {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| PaymentError::Config(format!("{name} not set")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> GatewayConfig {
        GatewayConfig {
            base_url: DEFAULT_BASE_URL.into(),
            api_key: "key".into(),
            recipient_address: "shop.near".into(),
            webhook_secret: None,
            app_url: "https://books.example".into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    #[test]
    fn test_redirect_urls() {
        let config = config();
        assert_eq!(
            config.success_url(),
            "https://books.example/payment/status?session_id={sessionId}"
        );
        assert_eq!(
            config.cancel_url("rust-in-action"),
            "https://books.example/store/rust-in-action"
        );
    }
}
