//! Server Configuration

use anyhow::Context;

use bookstore_payments::{GatewayConfig, RestStoreConfig};

/// External auth provider settings
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub url: String,
    pub api_key: String,
}

/// Everything the server reads from the environment at startup
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub gateway: GatewayConfig,
    /// `None` runs on the in-memory store
    pub store: Option<RestStoreConfig>,
    pub auth: AuthConfig,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
        let gateway = GatewayConfig::from_env().context("gateway configuration")?;
        let store = RestStoreConfig::from_env().context("store configuration")?;

        let auth = AuthConfig {
            url: std::env::var("AUTH_URL")
                .context("AUTH_URL not set")?
                .trim_end_matches('/')
                .to_string(),
            api_key: std::env::var("AUTH_API_KEY").context("AUTH_API_KEY not set")?,
        };

        Ok(Self {
            bind_addr,
            gateway,
            store,
            auth,
        })
    }
}
