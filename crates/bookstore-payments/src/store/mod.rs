//! Purchase Store
//!
//! Catalog reads plus the two purchase mutations this crate performs. Every
//! backend must make each mutation a single linearizable read-modify-write
//! on one row; no other synchronization is relied upon.

mod memory;
mod rest;

pub use memory::MemoryPurchaseStore;
pub use rest::{RestPurchaseStore, RestStoreConfig};

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{
    Book, BookId, PaymentStatus, PendingPurchase, Purchase, PurchaseId, UpsertOutcome, UserId,
};

/// Storage backend trait
#[async_trait]
pub trait PurchaseStore: Send + Sync {
    /// Get a catalog entry
    async fn get_book(&self, id: &BookId) -> Result<Option<Book>>;

    /// Get the purchase for a (user, book) pair
    async fn find_purchase(&self, user_id: &UserId, book_id: &BookId) -> Result<Option<Purchase>>;

    /// Get a purchase by primary key
    async fn get_purchase(&self, id: &PurchaseId) -> Result<Option<Purchase>>;

    /// Get a purchase by gateway session id
    async fn find_by_session(&self, session_id: &str) -> Result<Option<Purchase>>;

    /// Get a purchase by gateway payment id
    async fn find_by_payment(&self, payment_id: &str) -> Result<Option<Purchase>>;

    /// Insert a pending purchase or reopen the pair's non-completed one
    ///
    /// Atomic per (user, book): never yields two rows for one pair and
    /// never reopens a completed purchase.
    ///
    /// Refreshing a row replaces both `session_id` and `payment_id`, so
    /// identifiers of an abandoned session no longer match it.
    async fn upsert_pending(&self, pending: PendingPurchase) -> Result<UpsertOutcome>;

    /// Move a pending purchase to a terminal status
    ///
    /// Applies only while the stored status is `pending`. `payment_id` is
    /// written only when the stored one is null, in the same write as the
    /// status. Returns whether the status write happened.
    async fn record_outcome(
        &self,
        id: &PurchaseId,
        status: PaymentStatus,
        payment_id: Option<&str>,
    ) -> Result<bool>;

    /// Backend name for diagnostics
    fn backend(&self) -> &'static str;
}
