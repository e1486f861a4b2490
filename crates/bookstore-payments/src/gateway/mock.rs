//! Mock Gateway
//!
//! Scripted in-process gateway for tests and local development.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CreatedSession, PaymentGateway, SessionRequest, SessionStatus};
use crate::error::{PaymentError, Result};

/// Gateway double with per-session scripted statuses
///
/// Sessions report `PENDING` until scripted otherwise.
#[derive(Default)]
pub struct MockGateway {
    created: AtomicUsize,
    status_calls: AtomicUsize,
    fail_create: AtomicBool,
    statuses: RwLock<HashMap<String, Option<SessionStatus>>>,
    requests: RwLock<Vec<SessionRequest>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `create_session` fail until reset
    pub fn fail_session_creation(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    /// Script the provider status for a session
    pub async fn set_status(&self, session_id: &str, status: &str, payment_id: Option<&str>) {
        self.statuses.write().await.insert(
            session_id.to_string(),
            Some(SessionStatus {
                status: status.to_string(),
                payment_id: payment_id.map(str::to_string),
            }),
        );
    }

    /// Make status lookups for a session fail
    pub async fn set_unavailable(&self, session_id: &str) {
        self.statuses
            .write()
            .await
            .insert(session_id.to_string(), None);
    }

    pub fn sessions_created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    /// Requests seen by `create_session`, oldest first
    pub async fn requests(&self) -> Vec<SessionRequest> {
        self.requests.read().await.clone()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_session(&self, request: &SessionRequest) -> Result<CreatedSession> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(PaymentError::GatewayUnavailable("503: mock outage".into()));
        }

        self.requests.write().await.push(request.clone());
        let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
        let session_id = format!("cs_mock_{n}");

        Ok(CreatedSession {
            session_url: format!("https://pay.mock/checkout/{session_id}"),
            payment_id: Some(format!("pay_mock_{n}")),
            session_id,
        })
    }

    async fn get_session_status(&self, session_id: &str) -> Result<SessionStatus> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);

        match self.statuses.read().await.get(session_id) {
            Some(Some(status)) => Ok(status.clone()),
            Some(None) => Err(PaymentError::GatewayUnavailable("502: mock outage".into())),
            None => Ok(SessionStatus {
                status: "PENDING".into(),
                payment_id: None,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::Asset;

    fn request() -> SessionRequest {
        SessionRequest {
            amount: 1,
            asset: Asset::default(),
            recipient: "shop.near".into(),
            success_url: "s".into(),
            cancel_url: "c".into(),
        }
    }

    #[tokio::test]
    async fn test_scripted_statuses() {
        let gateway = MockGateway::new();
        let session = gateway.create_session(&request()).await.unwrap();
        assert_eq!(session.session_id, "cs_mock_1");

        let status = gateway.get_session_status("cs_mock_1").await.unwrap();
        assert_eq!(status.status, "PENDING");

        gateway.set_unavailable("cs_mock_1").await;
        assert!(gateway.get_session_status("cs_mock_1").await.is_err());
        assert_eq!(gateway.status_calls(), 2);
    }

    #[tokio::test]
    async fn test_creation_outage() {
        let gateway = MockGateway::new();
        gateway.fail_session_creation(true);
        assert!(gateway.create_session(&request()).await.is_err());
        assert_eq!(gateway.sessions_created(), 0);
    }
}
