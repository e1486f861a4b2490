//! Payment Error Types

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Order, reconciliation and webhook errors
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Missing or malformed caller input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Book id does not resolve to a catalog entry
    #[error("Book not found: {0}")]
    BookNotFound(String),

    /// No purchase matches the given identifiers
    #[error("Order not found")]
    OrderNotFound,

    /// The caller already owns this book
    #[error("Book already purchased")]
    AlreadyPurchased,

    /// Gateway unreachable, non-success status, or unreadable body
    #[error("Gateway unavailable: {0}")]
    GatewayUnavailable(String),

    /// Checkout session could not be created
    #[error("Payment session failed: {0}")]
    PaymentSessionFailed(String),

    /// Webhook secret, signature or timestamp missing or wrong
    #[error("Webhook unauthorized: {0}")]
    Unauthorized(String),

    /// Webhook payload carries no derivable event type
    #[error("Webhook missing event type")]
    MissingEventType,

    /// Webhook body is not the JSON we expect
    #[error("Webhook parse error: {0}")]
    WebhookParse(String),

    /// Price cannot be expressed in settlement units
    #[error("Amount conversion failed: {0}")]
    Amount(String),

    /// Store read failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Store write failed
    #[error("Storage write error: {0}")]
    StoreWrite(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl PaymentError {
    /// Stable machine-readable code
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::BookNotFound(_) => "book_not_found",
            Self::OrderNotFound => "order_not_found",
            Self::AlreadyPurchased => "already_purchased",
            Self::GatewayUnavailable(_) | Self::PaymentSessionFailed(_) => {
                "payment_session_failed"
            }
            Self::Unauthorized(_) => "invalid_signature",
            Self::MissingEventType => "missing_event_type",
            Self::WebhookParse(_) => "invalid_payload",
            Self::StoreWrite(_) => "store_write_failed",
            Self::Amount(_) | Self::Storage(_) | Self::Config(_) => "internal_error",
        }
    }

    /// Get user-friendly message
    pub const fn user_message(&self) -> &str {
        match self {
            Self::Validation(_) => "The request is missing required fields.",
            Self::BookNotFound(_) => "Book not found.",
            Self::OrderNotFound => "Order not found.",
            Self::AlreadyPurchased => "You already own this book.",
            Self::GatewayUnavailable(_) | Self::PaymentSessionFailed(_) => {
                "Payment processing failed. Please try again."
            }
            Self::Unauthorized(_) => "Invalid signature.",
            Self::MissingEventType => "Missing event type.",
            Self::WebhookParse(_) => "Invalid webhook payload.",
            Self::StoreWrite(_) => "Failed to update purchase.",
            _ => "An error occurred processing your request.",
        }
    }
}

impl From<reqwest::Error> for PaymentError {
    fn from(err: reqwest::Error) -> Self {
        Self::GatewayUnavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_failures_share_code() {
        assert_eq!(
            PaymentError::GatewayUnavailable("503".into()).code(),
            PaymentError::PaymentSessionFailed("503".into()).code()
        );
    }

    #[test]
    fn test_internal_errors_hide_detail() {
        let err = PaymentError::Storage("connection refused on 10.0.0.4".into());
        assert_eq!(err.code(), "internal_error");
        assert!(!err.user_message().contains("10.0.0.4"));
    }
}
