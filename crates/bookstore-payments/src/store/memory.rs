//! In-memory purchase store (for development and tests)

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::PurchaseStore;
use crate::error::{PaymentError, Result};
use crate::model::{
    Book, BookId, CURRENCY, PaymentStatus, PendingPurchase, Purchase, PurchaseId, UpsertOutcome,
    UserId,
};

#[derive(Default)]
struct Tables {
    books: HashMap<BookId, Book>,
    purchases: HashMap<PurchaseId, Purchase>,
    by_pair: HashMap<(UserId, BookId), PurchaseId>,
}

/// Purchase store backed by process memory
///
/// Every operation runs inside one lock acquisition, which gives the
/// per-row atomicity the reconciliation flow needs.
#[derive(Default)]
pub struct MemoryPurchaseStore {
    tables: RwLock<Tables>,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
}

impl MemoryPurchaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a catalog entry
    pub async fn insert_book(&self, book: Book) {
        self.tables.write().await.books.insert(book.id.clone(), book);
    }

    /// Number of purchase writes applied so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make every subsequent purchase write fail
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of purchase rows
    pub async fn purchase_count(&self) -> usize {
        self.tables.read().await.purchases.len()
    }

    /// Place a row as-is, bypassing the upsert rules
    #[cfg(test)]
    pub(crate) async fn insert_purchase(&self, purchase: Purchase) {
        let mut tables = self.tables.write().await;
        tables
            .by_pair
            .insert((purchase.user_id.clone(), purchase.book_id.clone()), purchase.id.clone());
        tables.purchases.insert(purchase.id.clone(), purchase);
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PaymentError::StoreWrite("memory store is read-only".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl PurchaseStore for MemoryPurchaseStore {
    async fn get_book(&self, id: &BookId) -> Result<Option<Book>> {
        Ok(self.tables.read().await.books.get(id).cloned())
    }

    async fn find_purchase(&self, user_id: &UserId, book_id: &BookId) -> Result<Option<Purchase>> {
        let tables = self.tables.read().await;
        Ok(tables
            .by_pair
            .get(&(user_id.clone(), book_id.clone()))
            .and_then(|id| tables.purchases.get(id))
            .cloned())
    }

    async fn get_purchase(&self, id: &PurchaseId) -> Result<Option<Purchase>> {
        Ok(self.tables.read().await.purchases.get(id).cloned())
    }

    async fn find_by_session(&self, session_id: &str) -> Result<Option<Purchase>> {
        Ok(self
            .tables
            .read()
            .await
            .purchases
            .values()
            .find(|p| p.session_id.as_deref() == Some(session_id))
            .cloned())
    }

    async fn find_by_payment(&self, payment_id: &str) -> Result<Option<Purchase>> {
        Ok(self
            .tables
            .read()
            .await
            .purchases
            .values()
            .find(|p| p.payment_id.as_deref() == Some(payment_id))
            .cloned())
    }

    async fn upsert_pending(&self, pending: PendingPurchase) -> Result<UpsertOutcome> {
        self.check_writable()?;
        let mut tables = self.tables.write().await;
        let key = (pending.user_id.clone(), pending.book_id.clone());

        if let Some(id) = tables.by_pair.get(&key).cloned() {
            let purchase = tables
                .purchases
                .get_mut(&id)
                .ok_or_else(|| PaymentError::Storage(format!("dangling pair index for {id}")))?;

            if purchase.payment_status == PaymentStatus::Completed {
                return Ok(UpsertOutcome::AlreadyCompleted);
            }

            // The abandoned session's payment id must not match the reopened row
            purchase.session_id = Some(pending.session_id);
            purchase.payment_id = pending.payment_id;
            purchase.payment_status = PaymentStatus::Pending;
            purchase.amount = pending.amount;

            self.writes.fetch_add(1, Ordering::SeqCst);
            return Ok(UpsertOutcome::Refreshed(purchase.clone()));
        }

        let purchase = Purchase {
            id: PurchaseId::new(uuid::Uuid::new_v4().to_string()),
            user_id: pending.user_id,
            book_id: pending.book_id,
            session_id: Some(pending.session_id),
            payment_id: pending.payment_id,
            payment_status: PaymentStatus::Pending,
            amount: pending.amount,
            currency: CURRENCY.into(),
            purchased_at: Utc::now(),
        };

        tables.by_pair.insert(key, purchase.id.clone());
        tables.purchases.insert(purchase.id.clone(), purchase.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);

        Ok(UpsertOutcome::Inserted(purchase))
    }

    async fn record_outcome(
        &self,
        id: &PurchaseId,
        status: PaymentStatus,
        payment_id: Option<&str>,
    ) -> Result<bool> {
        if !status.is_terminal() {
            return Err(PaymentError::Validation(format!("{status} is not terminal")));
        }
        self.check_writable()?;

        let mut tables = self.tables.write().await;
        let Some(purchase) = tables.purchases.get_mut(id) else {
            return Ok(false);
        };

        if purchase.payment_status != PaymentStatus::Pending {
            return Ok(false);
        }

        purchase.payment_status = status;
        if purchase.payment_id.is_none() {
            purchase.payment_id = payment_id.map(str::to_string);
        }
        self.writes.fetch_add(1, Ordering::SeqCst);

        Ok(true)
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn pending(session: &str, payment: Option<&str>) -> PendingPurchase {
        PendingPurchase {
            user_id: UserId::new("user-1"),
            book_id: BookId::new("book-1"),
            session_id: session.into(),
            payment_id: payment.map(str::to_string),
            amount: dec!(1.5),
        }
    }

    async fn inserted(store: &MemoryPurchaseStore) -> Purchase {
        match store.upsert_pending(pending("cs_1", None)).await.unwrap() {
            UpsertOutcome::Inserted(p) => p,
            other => panic!("expected insert, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_upsert_collapses_attempts() {
        let store = MemoryPurchaseStore::new();
        let first = inserted(&store).await;

        let outcome = store.upsert_pending(pending("cs_2", Some("pay_2"))).await.unwrap();
        let UpsertOutcome::Refreshed(second) = outcome else {
            panic!("expected refresh");
        };
        assert_eq!(second.id, first.id);
        assert_eq!(second.session_id.as_deref(), Some("cs_2"));
        assert_eq!(second.payment_id.as_deref(), Some("pay_2"));
    }

    #[tokio::test]
    async fn test_refresh_clears_old_payment_id() {
        let store = MemoryPurchaseStore::new();
        let first = match store.upsert_pending(pending("cs_1", Some("pay_1"))).await.unwrap() {
            UpsertOutcome::Inserted(p) => p,
            other => panic!("expected insert, got {other:?}"),
        };

        let outcome = store.upsert_pending(pending("cs_2", None)).await.unwrap();
        let UpsertOutcome::Refreshed(second) = outcome else {
            panic!("expected refresh");
        };
        assert_eq!(second.id, first.id);
        assert_eq!(second.payment_id, None);
        assert!(store.find_by_payment("pay_1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_never_reopens_completed() {
        let store = MemoryPurchaseStore::new();
        let purchase = inserted(&store).await;
        assert!(store
            .record_outcome(&purchase.id, PaymentStatus::Completed, Some("pay_1"))
            .await
            .unwrap());

        let outcome = store.upsert_pending(pending("cs_2", None)).await.unwrap();
        assert!(matches!(outcome, UpsertOutcome::AlreadyCompleted));
        let stored = store.get_purchase(&purchase.id).await.unwrap().unwrap();
        assert_eq!(stored.session_id.as_deref(), Some("cs_1"));
    }

    #[tokio::test]
    async fn test_record_outcome_is_guarded() {
        let store = MemoryPurchaseStore::new();
        let purchase = inserted(&store).await;

        assert!(store
            .record_outcome(&purchase.id, PaymentStatus::Completed, Some("pay_1"))
            .await
            .unwrap());
        assert!(!store
            .record_outcome(&purchase.id, PaymentStatus::Failed, Some("pay_other"))
            .await
            .unwrap());

        let stored = store.get_purchase(&purchase.id).await.unwrap().unwrap();
        assert_eq!(stored.payment_status, PaymentStatus::Completed);
        assert_eq!(stored.payment_id.as_deref(), Some("pay_1"));
        assert_eq!(store.write_count(), 2);
    }

    #[tokio::test]
    async fn test_payment_id_is_fill_only() {
        let store = MemoryPurchaseStore::new();
        let purchase = match store.upsert_pending(pending("cs_1", Some("pay_1"))).await.unwrap() {
            UpsertOutcome::Inserted(p) => p,
            other => panic!("expected insert, got {other:?}"),
        };

        store
            .record_outcome(&purchase.id, PaymentStatus::Failed, Some("pay_9"))
            .await
            .unwrap();
        let stored = store.find_by_payment("pay_1").await.unwrap().unwrap();
        assert_eq!(stored.id, purchase.id);
        assert_eq!(stored.payment_status, PaymentStatus::Failed);
    }

    #[tokio::test]
    async fn test_pending_is_not_a_terminal_write() {
        let store = MemoryPurchaseStore::new();
        let purchase = inserted(&store).await;
        assert!(store
            .record_outcome(&purchase.id, PaymentStatus::Pending, None)
            .await
            .is_err());
    }
}
