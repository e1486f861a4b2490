//! HTTP Handlers

use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
    http::HeaderMap,
};
use serde::{Deserialize, Serialize};

use bookstore_payments::{
    BookId, Checkout, PaymentStatus, PurchaseId, PurchaseLookup, WebhookOutcome,
    webhook::{SIGNATURE_HEADER, TIMESTAMP_HEADER},
};

use crate::auth::require_user;
use crate::error::ApiError;
use crate::state::AppState;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub store: &'static str,
    pub webhook_secret_configured: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub book_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    #[serde(default)]
    pub purchase_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub payment_status: PaymentStatus,
    pub book_title: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_status: Option<PaymentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        store: state.store_backend,
        webhook_secret_configured: state.webhook_secret_configured,
    })
}

/// Create a checkout session for a book
pub async fn create_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Checkout>, ApiError> {
    let user = require_user(state.auth.as_ref(), &headers).await?;

    // An unreadable body is treated like one without a book id
    let request: CreateOrderRequest = serde_json::from_slice(&body).unwrap_or_default();
    let book_id = non_empty(request.book_id)
        .ok_or(ApiError::bad_request("book_id_required", "book_id is required"))?;

    let checkout = state
        .orders
        .create_order(&user, &BookId::new(book_id))
        .await?;

    Ok(Json(checkout))
}

/// Poll a purchase's payment status
pub async fn verify_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<VerifyQuery>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let lookup = match (non_empty(query.purchase_id), non_empty(query.session_id)) {
        (Some(id), _) => PurchaseLookup::Id(PurchaseId::new(id)),
        (None, Some(session_id)) => PurchaseLookup::Session(session_id),
        (None, None) => {
            return Err(ApiError::bad_request(
                "identifier_required",
                "purchase_id or session_id is required",
            ));
        }
    };

    let user = require_user(state.auth.as_ref(), &headers).await?;
    let report = state.reconciler.check_status(&user, &lookup).await?;

    Ok(Json(VerifyResponse {
        payment_status: report.payment_status,
        book_title: report.book_title,
    }))
}

/// PingPay webhook receiver
pub async fn pingpay_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, ApiError> {
    // Raw bytes: the signature covers them exactly, whatever their encoding
    let outcome = state
        .webhooks
        .process(
            &body,
            header(&headers, SIGNATURE_HEADER),
            header(&headers, TIMESTAMP_HEADER),
        )
        .await?;

    let message = match outcome {
        WebhookOutcome::AlreadyProcessed => Some("Already processed".to_string()),
        WebhookOutcome::Acknowledged => Some("Event acknowledged".to_string()),
        WebhookOutcome::Settled { .. } => None,
    };

    Ok(Json(WebhookResponse {
        success: true,
        payment_status: outcome.payment_status(),
        message,
    }))
}
