//! # bookstore-payments
//!
//! Order creation and payment reconciliation for the NEAR bookstore.
//!
//! ## Flow
//!
//! ```text
//!  buyer ──POST /api/orders──▶ OrderService ──create_session──▶ PingPay
//!                                   │
//!                                   ▼ upsert pending
//!                            ┌──────────────┐
//!  buyer ──GET verify──▶ Reconciler ◀──┤ PurchaseStore├──▶ WebhookHandler ◀── PingPay
//!        (poll trigger)       │        └──────────────┘     (webhook trigger)
//!                             └─── settle(): pending → completed | failed ──┘
//! ```
//!
//! The poll and webhook triggers race. Both call [`Reconciler::settle`],
//! whose store write only lands while the purchase is still pending, so
//! whichever arrives first wins and the other becomes a no-op.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use bookstore_payments::{GatewayConfig, MemoryPurchaseStore, OrderService, PingPayClient};
//!
//! let config = Arc::new(GatewayConfig::from_env()?);
//! let gateway = Arc::new(PingPayClient::new(&config)?);
//! let store = Arc::new(MemoryPurchaseStore::new());
//!
//! let orders = OrderService::new(store, gateway, config);
//! let checkout = orders.create_order(&user_id, &book_id).await?;
//! // Redirect buyer to: checkout.session_url
//! ```

pub mod amount;
pub mod config;
pub mod gateway;
pub mod model;
pub mod orders;
pub mod reconcile;
pub mod store;
pub mod webhook;
mod error;

pub use config::GatewayConfig;
pub use error::{PaymentError, Result};
pub use gateway::{MockGateway, PaymentGateway, PingPayClient};
pub use model::{Book, BookId, PaymentStatus, Purchase, PurchaseId, PurchaseLookup, UserId};
pub use orders::{Checkout, OrderService};
pub use reconcile::{Reconciler, StatusReport};
pub use store::{MemoryPurchaseStore, PurchaseStore, RestPurchaseStore, RestStoreConfig};
pub use webhook::{WebhookHandler, WebhookOutcome};
