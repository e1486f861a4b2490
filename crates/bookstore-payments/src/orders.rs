//! Order Creation
//!
//! Turns "user wants book" into a payable checkout session and a pending
//! purchase record.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::amount::to_settlement_units;
use crate::config::GatewayConfig;
use crate::error::{PaymentError, Result};
use crate::gateway::{Asset, PaymentGateway, SessionRequest};
use crate::model::{BookId, PaymentStatus, PendingPurchase, UpsertOutcome, UserId};
use crate::store::PurchaseStore;

/// A created checkout, returned to the buyer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkout {
    pub session_id: String,
    pub session_url: String,
    pub payment_id: Option<String>,
}

/// Order creation service
#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn PurchaseStore>,
    gateway: Arc<dyn PaymentGateway>,
    config: Arc<GatewayConfig>,
}

impl OrderService {
    pub fn new(
        store: Arc<dyn PurchaseStore>,
        gateway: Arc<dyn PaymentGateway>,
        config: Arc<GatewayConfig>,
    ) -> Self {
        Self {
            store,
            gateway,
            config,
        }
    }

    /// Create a checkout session for `book_id` on behalf of `user_id`
    ///
    /// The store is untouched unless the gateway returned a session.
    pub async fn create_order(&self, user_id: &UserId, book_id: &BookId) -> Result<Checkout> {
        let book = self
            .store
            .get_book(book_id)
            .await?
            .ok_or_else(|| PaymentError::BookNotFound(book_id.to_string()))?;

        let owned = self
            .store
            .find_purchase(user_id, book_id)
            .await?
            .is_some_and(|p| p.payment_status == PaymentStatus::Completed);
        if owned {
            return Err(PaymentError::AlreadyPurchased);
        }

        let request = SessionRequest {
            amount: to_settlement_units(book.price)?,
            asset: Asset::default(),
            recipient: self.config.recipient_address.clone(),
            success_url: self.config.success_url(),
            cancel_url: self.config.cancel_url(&book.slug),
        };

        let session = self
            .gateway
            .create_session(&request)
            .await
            .map_err(|e| PaymentError::PaymentSessionFailed(e.to_string()))?;

        let outcome = self
            .store
            .upsert_pending(PendingPurchase {
                user_id: user_id.clone(),
                book_id: book.id.clone(),
                session_id: session.session_id.clone(),
                payment_id: session.payment_id.clone(),
                amount: book.price,
            })
            .await?;

        match outcome {
            UpsertOutcome::Inserted(purchase) | UpsertOutcome::Refreshed(purchase) => {
                tracing::info!(
                    purchase_id = %purchase.id,
                    book = %book.slug,
                    session_id = %session.session_id,
                    "Checkout session created"
                );
            }
            UpsertOutcome::AlreadyCompleted => {
                tracing::warn!(
                    user_id = %user_id,
                    book = %book.slug,
                    session_id = %session.session_id,
                    "Purchase completed while creating session, new session orphaned"
                );
                return Err(PaymentError::AlreadyPurchased);
            }
        }

        Ok(Checkout {
            session_id: session.session_id,
            session_url: session.session_url,
            payment_id: session.payment_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::BASE_PER_MICRO;
    use crate::gateway::MockGateway;
    use crate::model::Book;
    use crate::store::MemoryPurchaseStore;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    struct Fixture {
        store: Arc<MemoryPurchaseStore>,
        gateway: Arc<MockGateway>,
        service: OrderService,
    }

    fn book(price: Decimal) -> Book {
        Book {
            id: BookId::new("book-1"),
            title: "Zero to Production".into(),
            slug: "zero-to-production".into(),
            author: "Luca".into(),
            description: String::new(),
            price,
            page_count: Some(400),
            cover_image_url: None,
            download_url: None,
        }
    }

    async fn fixture(price: Decimal) -> Fixture {
        let store = Arc::new(MemoryPurchaseStore::new());
        store.insert_book(book(price)).await;
        let gateway = Arc::new(MockGateway::new());
        let config = Arc::new(GatewayConfig {
            base_url: "https://pay.mock".into(),
            api_key: "key".into(),
            recipient_address: "shop.near".into(),
            webhook_secret: None,
            app_url: "https://books.example".into(),
            timeout: Duration::from_secs(5),
        });
        let service = OrderService::new(store.clone(), gateway.clone(), config);
        Fixture {
            store,
            gateway,
            service,
        }
    }

    fn user() -> UserId {
        UserId::new("user-1")
    }

    #[tokio::test]
    async fn test_create_order_records_pending_purchase() {
        let fx = fixture(dec!(2.5)).await;
        let checkout = fx
            .service
            .create_order(&user(), &BookId::new("book-1"))
            .await
            .unwrap();
        assert_eq!(checkout.session_id, "cs_mock_1");

        let request = &fx.gateway.requests().await[0];
        assert_eq!(request.amount, 2_500_000 * BASE_PER_MICRO);
        assert_eq!(request.recipient, "shop.near");
        assert_eq!(request.cancel_url, "https://books.example/store/zero-to-production");

        let purchase = fx
            .store
            .find_purchase(&user(), &BookId::new("book-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(purchase.payment_status, PaymentStatus::Pending);
        assert_eq!(purchase.session_id.as_deref(), Some("cs_mock_1"));
        assert_eq!(purchase.amount, dec!(2.5));
    }

    #[tokio::test]
    async fn test_retry_reuses_record() {
        let fx = fixture(dec!(1)).await;
        let first = fx.service.create_order(&user(), &BookId::new("book-1")).await.unwrap();
        let second = fx.service.create_order(&user(), &BookId::new("book-1")).await.unwrap();
        assert_ne!(first.session_id, second.session_id);

        let purchase = fx
            .store
            .find_by_session(&second.session_id)
            .await
            .unwrap()
            .unwrap();
        assert!(fx.store.find_by_session(&first.session_id).await.unwrap().is_none());
        assert_eq!(purchase.payment_status, PaymentStatus::Pending);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_orders_share_one_row() {
        let fx = fixture(dec!(1)).await;

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let service = fx.service.clone();
                tokio::spawn(async move {
                    service.create_order(&user(), &BookId::new("book-1")).await
                })
            })
            .collect();

        let mut sessions = Vec::new();
        for task in tasks {
            sessions.push(task.await.unwrap().unwrap().session_id);
        }

        assert_eq!(fx.store.purchase_count().await, 1);
        assert_eq!(fx.gateway.sessions_created(), 16);

        // the row carries exactly one of the sessions handed out
        let purchase = fx
            .store
            .find_purchase(&user(), &BookId::new("book-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(purchase.payment_status, PaymentStatus::Pending);
        assert!(sessions.iter().any(|s| purchase.session_id.as_deref() == Some(s.as_str())));
    }

    #[tokio::test]
    async fn test_owned_book_is_rejected_without_session() {
        let fx = fixture(dec!(1)).await;
        fx.service.create_order(&user(), &BookId::new("book-1")).await.unwrap();
        let purchase = fx.store.find_by_session("cs_mock_1").await.unwrap().unwrap();
        fx.store
            .record_outcome(&purchase.id, PaymentStatus::Completed, None)
            .await
            .unwrap();

        let result = fx.service.create_order(&user(), &BookId::new("book-1")).await;
        assert!(matches!(result, Err(PaymentError::AlreadyPurchased)));
        assert_eq!(fx.gateway.sessions_created(), 1);
    }

    #[tokio::test]
    async fn test_unknown_book() {
        let fx = fixture(dec!(1)).await;
        let result = fx.service.create_order(&user(), &BookId::new("nope")).await;
        assert!(matches!(result, Err(PaymentError::BookNotFound(_))));
    }

    #[tokio::test]
    async fn test_gateway_failure_leaves_store_untouched() {
        let fx = fixture(dec!(1)).await;
        fx.gateway.fail_session_creation(true);

        let result = fx.service.create_order(&user(), &BookId::new("book-1")).await;
        assert!(matches!(result, Err(PaymentError::PaymentSessionFailed(_))));
        assert_eq!(fx.store.write_count(), 0);
    }
}
