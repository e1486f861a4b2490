//! HTTP Error Mapping
//!
//! Every handler error funnels through [`ApiError`]. Internal details are
//! logged here and never returned to the client.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::any::Any;
use thiserror::Error;

use bookstore_payments::PaymentError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Handler error
#[derive(Error, Debug)]
pub enum ApiError {
    /// No or invalid bearer token
    #[error("unauthenticated")]
    Unauthenticated,

    /// Missing request field
    #[error("bad request: {message}")]
    BadRequest {
        code: &'static str,
        message: &'static str,
    },

    /// Auth provider unreachable or misbehaving
    #[error("auth provider failed: {0}")]
    AuthProvider(anyhow::Error),

    #[error(transparent)]
    Payment(#[from] PaymentError),
}

impl ApiError {
    pub const fn bad_request(code: &'static str, message: &'static str) -> Self {
        Self::BadRequest { code, message }
    }

    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::AuthProvider(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Payment(err) => match err {
                PaymentError::Validation(_)
                | PaymentError::MissingEventType
                | PaymentError::WebhookParse(_) => StatusCode::BAD_REQUEST,
                PaymentError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
                PaymentError::BookNotFound(_) | PaymentError::OrderNotFound => {
                    StatusCode::NOT_FOUND
                }
                PaymentError::AlreadyPurchased => StatusCode::CONFLICT,
                PaymentError::GatewayUnavailable(_) | PaymentError::PaymentSessionFailed(_) => {
                    StatusCode::BAD_GATEWAY
                }
                PaymentError::StoreWrite(_)
                | PaymentError::Storage(_)
                | PaymentError::Amount(_)
                | PaymentError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn body(&self) -> ErrorResponse {
        let (error, code) = match self {
            Self::Unauthenticated => ("Authentication required.", "unauthorized"),
            Self::BadRequest { code, message } => (*message, *code),
            Self::AuthProvider(_) => ("Internal server error.", "internal_error"),
            Self::Payment(err) => (err.user_message(), err.code()),
        };
        ErrorResponse {
            error: error.into(),
            code: code.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = self.body();

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), code = %body.code, error = %self, "Request failed");
        } else {
            tracing::warn!(status = status.as_u16(), code = %body.code, "Request rejected");
        }

        (status, Json(body)).into_response()
    }
}

/// Response for a panicking handler
pub fn internal_error(_panic: Box<dyn Any + Send + 'static>) -> Response {
    tracing::error!("Handler panicked");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: "Internal server error.".into(),
            code: "internal_error".into(),
        }),
    )
        .into_response()
}
