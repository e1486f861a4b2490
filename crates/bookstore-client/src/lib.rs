//! NEAR bookstore client
//!
//! Drives the payment status page after the buyer returns from the
//! gateway: polls `/api/orders/verify` until the purchase settles.

pub mod api;
mod error;
pub mod poller;

pub use api::VerifyClient;
pub use error::{ClientError, Result};
pub use poller::{PaymentPoller, PollOutcome, PollerConfig, StatusProbe, StatusSource};
