//! Caller Authentication
//!
//! Identity is owned by an external auth provider. We only resolve a
//! bearer token to the provider's user id.

use std::collections::HashMap;

use async_trait::async_trait;
use axum::http::{HeaderMap, header::AUTHORIZATION};
use serde::Deserialize;

use bookstore_payments::UserId;

use crate::config::AuthConfig;
use crate::error::ApiError;

/// Resolves bearer tokens to user ids
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// `Ok(None)` when the token is not valid
    async fn authenticate(&self, token: &str) -> anyhow::Result<Option<UserId>>;
}

/// Auth provider reached over HTTP (`GET /auth/v1/user`)
pub struct RemoteAuthenticator {
    http: reqwest::Client,
    config: AuthConfig,
}

#[derive(Deserialize)]
struct ProviderUser {
    id: String,
}

impl RemoteAuthenticator {
    pub fn new(config: AuthConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl Authenticator for RemoteAuthenticator {
    async fn authenticate(&self, token: &str) -> anyhow::Result<Option<UserId>> {
        let response = self
            .http
            .get(format!("{}/auth/v1/user", self.config.url))
            .header("apikey", &self.config.api_key)
            .bearer_auth(token)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Ok(None);
        }
        if !status.is_success() {
            anyhow::bail!("auth provider returned {status}");
        }

        let user: ProviderUser = response.json().await?;
        Ok(Some(UserId::new(user.id)))
    }
}

/// Fixed token table (for tests and local development)
#[derive(Default)]
pub struct StaticAuthenticator {
    tokens: HashMap<String, UserId>,
}

impl StaticAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_user(mut self, token: impl Into<String>, user: impl Into<String>) -> Self {
        self.tokens.insert(token.into(), UserId::new(user));
        self
    }
}

#[async_trait]
impl Authenticator for StaticAuthenticator {
    async fn authenticate(&self, token: &str) -> anyhow::Result<Option<UserId>> {
        Ok(self.tokens.get(token).cloned())
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Resolve the caller or reject with 401
///
/// A failing auth provider is a server error, not a rejected token.
pub async fn require_user(auth: &dyn Authenticator, headers: &HeaderMap) -> Result<UserId, ApiError> {
    let token = bearer_token(headers).ok_or(ApiError::Unauthenticated)?;

    match auth.authenticate(token).await {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(ApiError::Unauthenticated),
        Err(e) => Err(ApiError::AuthProvider(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer tok_1"));
        assert_eq!(bearer_token(&headers), Some("tok_1"));
    }

    #[tokio::test]
    async fn test_require_user() {
        let auth = StaticAuthenticator::new().with_user("tok_1", "user-1");
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer tok_1"));
        assert_eq!(require_user(&auth, &headers).await.unwrap(), UserId::new("user-1"));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer tok_2"));
        assert!(matches!(
            require_user(&auth, &headers).await,
            Err(ApiError::Unauthenticated)
        ));
    }

    struct DownAuthenticator;

    #[async_trait]
    impl Authenticator for DownAuthenticator {
        async fn authenticate(&self, _token: &str) -> anyhow::Result<Option<UserId>> {
            anyhow::bail!("auth provider returned 503 Service Unavailable")
        }
    }

    #[tokio::test]
    async fn test_provider_outage_is_server_error() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer tok_1"));

        let error = require_user(&DownAuthenticator, &headers).await.unwrap_err();
        assert!(matches!(error, ApiError::AuthProvider(_)));
        assert_eq!(error.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    }
}
