//! Payment Gateway Integration
//!
//! Thin request/response wrapper over the hosted checkout provider. One
//! attempt per call, no retries and no local persistence.

mod mock;
mod pingpay;

pub use mock::MockGateway;
pub use pingpay::PingPayClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{ASSET_CHAIN, ASSET_SYMBOL};
use crate::error::Result;

/// Settlement asset
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub chain: String,
    pub symbol: String,
}

impl Default for Asset {
    fn default() -> Self {
        Self {
            chain: ASSET_CHAIN.into(),
            symbol: ASSET_SYMBOL.into(),
        }
    }
}

/// Input to [`PaymentGateway::create_session`]
#[derive(Clone, Debug)]
pub struct SessionRequest {
    /// Amount in the asset's smallest unit
    pub amount: u128,
    pub asset: Asset,
    pub recipient: String,
    pub success_url: String,
    pub cancel_url: String,
}

/// A freshly created checkout session
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreatedSession {
    pub session_id: String,
    pub payment_id: Option<String>,
    pub session_url: String,
}

/// Provider's view of a session. `status` is the raw provider string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionStatus {
    pub status: String,
    pub payment_id: Option<String>,
}

/// Gateway client trait
///
/// Both operations fail with `GatewayUnavailable` on transport errors,
/// non-success HTTP status or unreadable bodies.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a hosted checkout session
    async fn create_session(&self, request: &SessionRequest) -> Result<CreatedSession>;

    /// Fetch the current status of a session
    async fn get_session_status(&self, session_id: &str) -> Result<SessionStatus>;
}
