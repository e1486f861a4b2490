//! Catalog and Purchase Records

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Settlement currency recorded on every purchase
pub const CURRENCY: &str = "NEAR";

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Identity assigned by the external auth provider
    UserId
);
string_id!(
    /// Catalog key of a book
    BookId
);
string_id!(
    /// Primary key of a purchase row
    PurchaseId
);

/// A catalog entry (read-only here)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub slug: String,
    pub author: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default)]
    pub page_count: Option<u32>,
    #[serde(default)]
    pub cover_image_url: Option<String>,
    #[serde(default)]
    pub download_url: Option<String>,
}

/// Payment state of a purchase
///
/// `Pending` is the only non-terminal state. See [`crate::reconcile`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl PaymentStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A purchase attempt for one (user, book) pair
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Purchase {
    pub id: PurchaseId,
    pub user_id: UserId,
    pub book_id: BookId,
    pub session_id: Option<String>,
    pub payment_id: Option<String>,
    pub payment_status: PaymentStatus,
    pub amount: Decimal,
    pub currency: String,
    pub purchased_at: DateTime<Utc>,
}

/// Fields written by order creation
#[derive(Clone, Debug)]
pub struct PendingPurchase {
    pub user_id: UserId,
    pub book_id: BookId,
    pub session_id: String,
    pub payment_id: Option<String>,
    pub amount: Decimal,
}

/// Result of [`crate::PurchaseStore::upsert_pending`]
#[derive(Clone, Debug)]
pub enum UpsertOutcome {
    /// No row existed for the pair
    Inserted(Purchase),
    /// A pending or failed row was reopened with the new session
    Refreshed(Purchase),
    /// The pair was completed before the write landed
    AlreadyCompleted,
}

/// How an owner addresses a purchase when polling
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PurchaseLookup {
    Id(PurchaseId),
    Session(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_format() {
        let json = serde_json::to_string(&PaymentStatus::Completed).unwrap();
        assert_eq!(json, "\"completed\"");

        let parsed: PaymentStatus = serde_json::from_str("\"failed\"").unwrap();
        assert_eq!(parsed, PaymentStatus::Failed);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!PaymentStatus::Pending.is_terminal());
        assert!(PaymentStatus::Completed.is_terminal());
        assert!(PaymentStatus::Failed.is_terminal());
    }
}
