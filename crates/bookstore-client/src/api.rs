//! API Client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use bookstore_payments::PaymentStatus;

use crate::error::{ClientError, Result};
use crate::poller::{StatusProbe, StatusSource};

/// Body of a successful `GET /api/orders/verify`
#[derive(Debug, Deserialize)]
struct VerifyBody {
    payment_status: PaymentStatus,
    #[serde(default)]
    book_title: Option<String>,
}

/// Calls the status endpoint on behalf of a signed-in buyer
pub struct VerifyClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl VerifyClient {
    pub fn new(base_url: &str, token: impl Into<String>) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/');
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ClientError::Config(format!("base url must be http(s): {base_url}")));
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.to_string(),
            token: token.into(),
        })
    }

    /// One status check
    pub async fn fetch(&self, session_id: &str) -> Result<StatusProbe> {
        let response = self
            .http
            .get(format!("{}/api/orders/verify", self.base_url))
            .query(&[("session_id", session_id)])
            .bearer_auth(&self.token)
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;
        Ok(classify(status, &body))
    }
}

#[async_trait]
impl StatusSource for VerifyClient {
    async fn probe(&self, session_id: &str) -> StatusProbe {
        match self.fetch(session_id).await {
            Ok(probe) => probe,
            Err(e) => {
                tracing::warn!(session_id, error = %e, "Status check request failed");
                StatusProbe::Transient
            }
        }
    }
}

/// Map an HTTP answer onto a probe result
fn classify(status: StatusCode, body: &[u8]) -> StatusProbe {
    match status {
        StatusCode::NOT_FOUND => StatusProbe::NotFound,
        StatusCode::UNAUTHORIZED => StatusProbe::Unauthenticated,
        s if s.is_success() => match serde_json::from_slice::<VerifyBody>(body) {
            Ok(body) => StatusProbe::Status {
                status: body.payment_status,
                book_title: body.book_title,
            },
            Err(e) => {
                tracing::warn!(error = %e, "Unreadable status response");
                StatusProbe::Transient
            }
        },
        _ => StatusProbe::Transient,
    }
}
