//! Application State

use std::sync::Arc;

use bookstore_payments::{
    GatewayConfig, OrderService, PaymentGateway, PurchaseStore, Reconciler, WebhookHandler,
};

use crate::auth::Authenticator;

/// Shared application state
///
/// Read-only after startup; requests share nothing mutable in process.
#[derive(Clone)]
pub struct AppState {
    /// Order creation service
    pub orders: OrderService,

    /// Poll-trigger reconciliation
    pub reconciler: Reconciler,

    /// Webhook-trigger reconciliation
    pub webhooks: Arc<WebhookHandler>,

    /// External auth provider
    pub auth: Arc<dyn Authenticator>,

    /// Store backend name, for health reporting
    pub store_backend: &'static str,

    pub webhook_secret_configured: bool,
}

impl AppState {
    pub fn new(
        store: Arc<dyn PurchaseStore>,
        gateway: Arc<dyn PaymentGateway>,
        config: Arc<GatewayConfig>,
        auth: Arc<dyn Authenticator>,
    ) -> Self {
        let store_backend = store.backend();
        let webhook_secret_configured = config.webhook_secret.is_some();
        let reconciler = Reconciler::new(store.clone(), gateway.clone());
        let webhooks = WebhookHandler::new(reconciler.clone(), config.webhook_secret.clone());

        Self {
            orders: OrderService::new(store, gateway, config),
            reconciler,
            webhooks: Arc::new(webhooks),
            auth,
            store_backend,
            webhook_secret_configured,
        }
    }
}
