//! PingPay Checkout Client
//!
//! `POST /api/checkout/sessions` and `GET /api/checkout/sessions/{id}`,
//! both authenticated with the static `x-api-key` header.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{Asset, CreatedSession, PaymentGateway, SessionRequest, SessionStatus};
use crate::config::{GatewayConfig, RECIPIENT_CHAIN_ID};
use crate::error::{PaymentError, Result};

const API_KEY_HEADER: &str = "x-api-key";

/// HTTP client for the PingPay hosted checkout API
pub struct PingPayClient {
    http: Client,
    base_url: String,
    api_key: String,
}

impl PingPayClient {
    /// Create a client from gateway configuration
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PaymentError::Config(format!("http client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
        })
    }

    fn sessions_url(&self) -> String {
        format!("{}/api/checkout/sessions", self.base_url)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionBody<'a> {
    amount: String,
    asset: &'a Asset,
    recipient: Recipient<'a>,
    success_url: &'a str,
    cancel_url: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Recipient<'a> {
    address: &'a str,
    chain_id: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionResponse {
    session: SessionRef,
    session_url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionRef {
    session_id: String,
    #[serde(default)]
    payment_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionBody {
    status: String,
    #[serde(default)]
    payment_id: Option<String>,
}

/// Accepts both `{ "session": { "status": .. } }` and a flat `{ "status": .. }`
fn parse_status_body(body: &serde_json::Value) -> Result<SessionStatus> {
    let session = body.get("session").unwrap_or(body);
    let parsed: SessionBody = serde_json::from_value(session.clone())
        .map_err(|e| PaymentError::GatewayUnavailable(format!("malformed session body: {e}")))?;

    Ok(SessionStatus {
        status: parsed.status,
        payment_id: parsed.payment_id.filter(|p| !p.is_empty()),
    })
}

async fn error_body(response: reqwest::Response) -> String {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    format!("{status}: {text}")
}

#[async_trait]
impl PaymentGateway for PingPayClient {
    async fn create_session(&self, request: &SessionRequest) -> Result<CreatedSession> {
        let body = CreateSessionBody {
            amount: request.amount.to_string(),
            asset: &request.asset,
            recipient: Recipient {
                address: &request.recipient,
                chain_id: RECIPIENT_CHAIN_ID,
            },
            success_url: &request.success_url,
            cancel_url: &request.cancel_url,
        };

        let response = self
            .http
            .post(self.sessions_url())
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let detail = error_body(response).await;
            tracing::error!(detail = %detail, "PingPay session creation failed");
            return Err(PaymentError::GatewayUnavailable(detail));
        }

        let created: CreateSessionResponse = response
            .json()
            .await
            .map_err(|e| PaymentError::GatewayUnavailable(format!("malformed session: {e}")))?;

        Ok(CreatedSession {
            session_id: created.session.session_id,
            payment_id: created.session.payment_id.filter(|p| !p.is_empty()),
            session_url: created.session_url,
        })
    }

    async fn get_session_status(&self, session_id: &str) -> Result<SessionStatus> {
        let mut url = reqwest::Url::parse(&self.sessions_url())
            .map_err(|e| PaymentError::Config(format!("gateway url: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| PaymentError::Config("gateway url cannot be a base".into()))?
            .push(session_id);

        let response = self
            .http
            .get(url)
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            let detail = error_body(response).await;
            tracing::warn!(session_id = %session_id, detail = %detail, "PingPay session retrieve failed");
            return Err(PaymentError::GatewayUnavailable(detail));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| PaymentError::GatewayUnavailable(format!("malformed session: {e}")))?;

        tracing::debug!(session_id = %session_id, body = %body, "PingPay session retrieved");
        parse_status_body(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_wrapped_status() {
        let body = json!({"session": {"status": "PAID", "paymentId": "pay_1"}});
        let status = parse_status_body(&body).unwrap();
        assert_eq!(status.status, "PAID");
        assert_eq!(status.payment_id.as_deref(), Some("pay_1"));
    }

    #[test]
    fn test_parse_flat_status() {
        let body = json!({"status": "pending", "paymentId": ""});
        let status = parse_status_body(&body).unwrap();
        assert_eq!(status.status, "pending");
        assert_eq!(status.payment_id, None);
    }

    #[test]
    fn test_missing_status_is_unavailable() {
        let body = json!({"session": {"paymentId": "pay_1"}});
        assert!(matches!(
            parse_status_body(&body),
            Err(PaymentError::GatewayUnavailable(_))
        ));
    }

    #[test]
    fn test_create_body_shape() {
        let asset = Asset::default();
        let body = CreateSessionBody {
            amount: 2_500_000_000_000_000_000_000_000u128.to_string(),
            asset: &asset,
            recipient: Recipient {
                address: "shop.near",
                chain_id: RECIPIENT_CHAIN_ID,
            },
            success_url: "https://books.example/payment/status?session_id={sessionId}",
            cancel_url: "https://books.example/store/slug",
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["amount"], "2500000000000000000000000");
        assert_eq!(value["asset"]["symbol"], "wNEAR");
        assert_eq!(value["recipient"]["chainId"], "near-mainnet");
        assert!(value.get("successUrl").is_some());
    }
}
