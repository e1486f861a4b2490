//! NEAR bookstore HTTP server
//!
//! Serves checkout creation, payment status polling and the PingPay webhook.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bookstore_payments::{
    MemoryPurchaseStore, PaymentGateway, PingPayClient, PurchaseStore, RestPurchaseStore,
};
use bookstore_server::{AppState, auth::RemoteAuthenticator, config::ServerConfig, router};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();
    let config = ServerConfig::from_env()?;

    // Payment gateway
    let gateway: Arc<dyn PaymentGateway> = Arc::new(PingPayClient::new(&config.gateway)?);
    tracing::info!(base_url = %config.gateway.base_url, "✓ PingPay configured");

    if config.gateway.webhook_secret.is_none() {
        tracing::warn!("⚠ PINGPAY_WEBHOOK_SECRET not set - webhooks will be rejected");
    }

    // Purchase store
    let store: Arc<dyn PurchaseStore> = match config.store.clone() {
        Some(store_config) => {
            tracing::info!(url = %store_config.url, "✓ Using REST purchase store");
            Arc::new(RestPurchaseStore::new(store_config))
        }
        None => {
            tracing::warn!("⚠ STORE_URL not set - using in-memory store");
            tracing::warn!("  Purchases will be lost on restart");
            Arc::new(MemoryPurchaseStore::new())
        }
    };

    let auth = Arc::new(RemoteAuthenticator::new(config.auth.clone()));
    let state = AppState::new(store, gateway, Arc::new(config.gateway.clone()), auth);
    let app = router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 bookstore server running on http://{}", config.bind_addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health               - Health check");
    tracing::info!("  POST /api/orders           - Create checkout session");
    tracing::info!("  GET  /api/orders/verify    - Poll payment status");
    tracing::info!("  POST /api/pingpay/webhook  - PingPay notifications");
    tracing::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}
