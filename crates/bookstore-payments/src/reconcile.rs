//! Payment Reconciliation
//!
//! A purchase's payment status is decided by two independent channels: the
//! buyer's client polling [`Reconciler::check_status`], and the gateway
//! pushing webhooks (see [`crate::webhook`]). Either may report first, late,
//! twice, or never. Both funnel through [`apply_outcome`] and then
//! [`Reconciler::settle`], which writes through the store's guarded
//! [`PurchaseStore::record_outcome`].
//!
//! ```text
//!            ┌──────────┐
//!            │ pending  │
//!            └────┬─────┘
//!        success  │  failure
//!       ┌─────────┴─────────┐
//!       ▼                   ▼
//! ┌───────────┐       ┌──────────┐
//! │ completed │       │  failed  │
//! └───────────┘       └──────────┘
//! ```
//!
//! Terminal states absorb every later signal, so the two channels commute.

use std::sync::Arc;

use crate::error::{PaymentError, Result};
use crate::gateway::PaymentGateway;
use crate::model::{PaymentStatus, Purchase, PurchaseLookup, UserId};
use crate::store::PurchaseStore;

/// Provider statuses that mean the payment settled
const SUCCESS_STATUSES: [&str; 3] = ["COMPLETED", "SUCCESS", "PAID"];

/// Provider statuses that mean the session is dead
const FAILURE_STATUSES: [&str; 3] = ["EXPIRED", "FAILED", "CANCELLED"];

/// A payment outcome reported by the gateway, in either channel
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaymentSignal {
    Succeeded,
    Failed,
    Pending,
}

impl PaymentSignal {
    /// Classify a provider status string, case-insensitively
    ///
    /// Returns `None` for statuses outside the known vocabulary.
    pub fn classify(raw: &str) -> Option<Self> {
        let status = raw.trim().to_uppercase();
        if SUCCESS_STATUSES.contains(&status.as_str()) {
            Some(Self::Succeeded)
        } else if FAILURE_STATUSES.contains(&status.as_str()) {
            Some(Self::Failed)
        } else if status == "PENDING" {
            Some(Self::Pending)
        } else {
            None
        }
    }
}

/// Map a polled provider status onto a signal; unknown means still pending
pub fn normalize_status(raw: &str) -> PaymentSignal {
    PaymentSignal::classify(raw).unwrap_or(PaymentSignal::Pending)
}

/// Result of [`apply_outcome`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Nothing to write
    Unchanged(PaymentStatus),
    /// Write this terminal status
    Advance(PaymentStatus),
}

/// The payment state machine
///
/// Only `pending` moves, and only to a terminal state.
pub const fn apply_outcome(current: PaymentStatus, signal: PaymentSignal) -> Transition {
    match (current, signal) {
        (PaymentStatus::Pending, PaymentSignal::Succeeded) => {
            Transition::Advance(PaymentStatus::Completed)
        }
        (PaymentStatus::Pending, PaymentSignal::Failed) => {
            Transition::Advance(PaymentStatus::Failed)
        }
        (status, _) => Transition::Unchanged(status),
    }
}

/// What [`Reconciler::settle`] did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Settlement {
    /// Status now stored for the purchase
    pub status: PaymentStatus,
    /// Whether this call performed the write
    pub written: bool,
}

/// Answer to a buyer's status poll
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusReport {
    pub payment_status: PaymentStatus,
    pub book_title: Option<String>,
}

/// Resolves purchases to their true payment status
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn PurchaseStore>,
    gateway: Arc<dyn PaymentGateway>,
}

impl Reconciler {
    pub fn new(store: Arc<dyn PurchaseStore>, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self { store, gateway }
    }

    /// Poll trigger: report an owner's purchase status, consulting the
    /// gateway while it is still pending
    ///
    /// Gateway failures are not errors here; the stored status is reported
    /// and the caller polls again.
    pub async fn check_status(
        &self,
        owner: &UserId,
        lookup: &PurchaseLookup,
    ) -> Result<StatusReport> {
        let purchase = match lookup {
            PurchaseLookup::Id(id) => self.store.get_purchase(id).await?,
            PurchaseLookup::Session(session_id) => self.store.find_by_session(session_id).await?,
        }
        .filter(|p| &p.user_id == owner)
        .ok_or(PaymentError::OrderNotFound)?;

        let book_title = self
            .store
            .get_book(&purchase.book_id)
            .await?
            .map(|book| book.title);

        let payment_status = self.poll(&purchase).await?;
        Ok(StatusReport {
            payment_status,
            book_title,
        })
    }

    async fn poll(&self, purchase: &Purchase) -> Result<PaymentStatus> {
        if purchase.payment_status.is_terminal() {
            return Ok(purchase.payment_status);
        }

        let Some(session_id) = purchase.session_id.as_deref() else {
            return Ok(purchase.payment_status);
        };

        let remote = match self.gateway.get_session_status(session_id).await {
            Ok(remote) => remote,
            Err(e) => {
                tracing::warn!(
                    purchase_id = %purchase.id,
                    session_id = %session_id,
                    error = %e,
                    "Gateway poll failed, reporting stored status"
                );
                return Ok(purchase.payment_status);
            }
        };

        match normalize_status(&remote.status) {
            PaymentSignal::Pending => Ok(purchase.payment_status),
            signal => {
                let settlement = self
                    .settle(purchase, signal, remote.payment_id.as_deref())
                    .await?;
                Ok(settlement.status)
            }
        }
    }

    /// Apply a signal to a purchase and persist any terminal transition
    ///
    /// Shared by the poll and webhook triggers. When the guarded write loses
    /// a race the stored status is re-read and reported instead.
    pub async fn settle(
        &self,
        purchase: &Purchase,
        signal: PaymentSignal,
        payment_id: Option<&str>,
    ) -> Result<Settlement> {
        let next = match apply_outcome(purchase.payment_status, signal) {
            Transition::Unchanged(status) => {
                return Ok(Settlement {
                    status,
                    written: false,
                });
            }
            Transition::Advance(next) => next,
        };

        if self
            .store
            .record_outcome(&purchase.id, next, payment_id)
            .await?
        {
            tracing::info!(
                purchase_id = %purchase.id,
                session_id = ?purchase.session_id,
                status = %next,
                "Purchase settled"
            );
            return Ok(Settlement {
                status: next,
                written: true,
            });
        }

        let stored = self
            .store
            .get_purchase(&purchase.id)
            .await?
            .map_or(next, |p| p.payment_status);
        tracing::debug!(
            purchase_id = %purchase.id,
            status = %stored,
            "Purchase already settled by another channel"
        );

        Ok(Settlement {
            status: stored,
            written: false,
        })
    }

    pub fn store(&self) -> &Arc<dyn PurchaseStore> {
        &self.store
    }
}
