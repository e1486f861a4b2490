//! NEAR bookstore HTTP server
//!
//! Axum router for checkout creation, status polling and the PingPay
//! webhook. Business logic lives in `bookstore-payments`.

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod state;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::handlers::{create_order, health_check, pingpay_webhook, verify_order};
pub use crate::state::AppState;

/// Build the application router
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/orders", post(create_order))
        .route("/api/orders/verify", get(verify_order))
        .route("/api/pingpay/webhook", post(pingpay_webhook))
        .layer(CatchPanicLayer::custom(error::internal_error))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
