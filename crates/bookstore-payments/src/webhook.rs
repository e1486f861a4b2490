//! PingPay Webhook Handling
//!
//! Authenticates gateway callbacks and feeds them into the same settlement
//! step the status poll uses.
//!
//! Signature: hex HMAC-SHA256 over `"{timestamp}.{raw_body}"` with the shared
//! webhook secret, carried in `x-ping-signature` / `x-ping-timestamp`.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::error::{PaymentError, Result};
use crate::model::{PaymentStatus, Purchase};
use crate::reconcile::{PaymentSignal, Reconciler};

pub const SIGNATURE_HEADER: &str = "x-ping-signature";
pub const TIMESTAMP_HEADER: &str = "x-ping-timestamp";

type HmacSha256 = Hmac<Sha256>;

/// Compute the hex signature the gateway sends for a body
pub fn sign(secret: &str, timestamp: &str, body: impl AsRef<[u8]>) -> String {
    hex::encode(signer(secret, timestamp, body.as_ref()).finalize().into_bytes())
}

fn signer(secret: &str, timestamp: &str, body: &[u8]) -> HmacSha256 {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(body);
    mac
}

/// Check a webhook signature
///
/// Any missing piece is a failure: an unconfigured secret rejects every
/// callback.
pub fn verify_signature(
    secret: Option<&str>,
    signature: Option<&str>,
    timestamp: Option<&str>,
    body: &[u8],
) -> Result<()> {
    let secret = secret.ok_or_else(|| PaymentError::Unauthorized("webhook secret not configured".into()))?;
    let signature = signature.ok_or_else(|| PaymentError::Unauthorized("missing signature".into()))?;
    let timestamp = timestamp.ok_or_else(|| PaymentError::Unauthorized("missing timestamp".into()))?;

    let expected = hex::decode(signature.trim())
        .map_err(|_| PaymentError::Unauthorized("signature is not hex".into()))?;

    signer(secret, timestamp, body)
        .verify_slice(&expected)
        .map_err(|_| PaymentError::Unauthorized("signature mismatch".into()))
}

/// Event class of a notification
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventKind {
    Succeeded,
    Failed,
    Pending,
    /// Recognized envelope, no action for this type
    Unhandled(String),
}

impl EventKind {
    fn from_type(event_type: &str) -> Self {
        match event_type {
            "payment.success" | "checkout.session.completed" => Self::Succeeded,
            "payment.failed" | "checkout.session.expired" => Self::Failed,
            "payment.pending" => Self::Pending,
            other => Self::Unhandled(other.to_string()),
        }
    }

    const fn signal(&self) -> Option<PaymentSignal> {
        match self {
            Self::Succeeded => Some(PaymentSignal::Succeeded),
            Self::Failed => Some(PaymentSignal::Failed),
            Self::Pending | Self::Unhandled(_) => None,
        }
    }
}

/// A gateway callback reduced to what settlement needs
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentNotification {
    pub kind: EventKind,
    pub session_id: Option<String>,
    pub payment_id: Option<String>,
}

/// Wire shape. Either `{ type, resourceId, data: {..} }` or a flat
/// `{ status, sessionId, paymentId }`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNotification {
    #[serde(rename = "type")]
    event_type: Option<String>,
    resource_id: Option<String>,
    data: Option<RawData>,
    status: Option<String>,
    session_id: Option<String>,
    payment_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawData {
    session_id: Option<String>,
    #[serde(rename = "session_id")]
    session_id_snake: Option<String>,
    payment_id: Option<String>,
    #[serde(rename = "payment_id")]
    payment_id_snake: Option<String>,
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl RawNotification {
    fn normalize(self) -> Result<PaymentNotification> {
        let kind = match (present(self.event_type), present(self.status)) {
            (Some(event_type), _) => EventKind::from_type(&event_type),
            (None, Some(status)) => match PaymentSignal::classify(&status) {
                Some(PaymentSignal::Succeeded) => EventKind::Succeeded,
                Some(PaymentSignal::Failed) => EventKind::Failed,
                Some(PaymentSignal::Pending) => EventKind::Pending,
                None => return Err(PaymentError::MissingEventType),
            },
            (None, None) => return Err(PaymentError::MissingEventType),
        };

        let data = self.data.unwrap_or_default();
        let session_id = present(data.session_id)
            .or_else(|| present(self.session_id))
            .or_else(|| present(data.session_id_snake));
        let payment_id = present(self.resource_id)
            .or_else(|| present(self.payment_id))
            .or_else(|| present(data.payment_id))
            .or_else(|| present(data.payment_id_snake));

        Ok(PaymentNotification {
            kind,
            session_id,
            payment_id,
        })
    }
}

/// Parse and normalize a verified webhook body
///
/// The body is only read as UTF-8 JSON here, after the signature check.
pub fn parse_notification(body: &[u8]) -> Result<PaymentNotification> {
    let raw: RawNotification =
        serde_json::from_slice(body).map_err(|e| PaymentError::WebhookParse(e.to_string()))?;
    raw.normalize()
}

/// What a webhook delivery did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Purchase was already completed; nothing written
    AlreadyProcessed,
    /// Event type needs no action
    Acknowledged,
    /// Settlement ran; `status` is what is stored now
    Settled { status: PaymentStatus, written: bool },
}

impl WebhookOutcome {
    /// Status to echo back, when settlement ran
    pub const fn payment_status(&self) -> Option<PaymentStatus> {
        match self {
            Self::Settled { status, .. } => Some(*status),
            Self::AlreadyProcessed | Self::Acknowledged => None,
        }
    }
}

/// Webhook handler
pub struct WebhookHandler {
    reconciler: Reconciler,
    secret: Option<String>,
}

impl WebhookHandler {
    pub const fn new(reconciler: Reconciler, secret: Option<String>) -> Self {
        Self { reconciler, secret }
    }

    /// Verify signature and parse the notification
    pub fn parse_event(
        &self,
        body: &[u8],
        signature: Option<&str>,
        timestamp: Option<&str>,
    ) -> Result<PaymentNotification> {
        verify_signature(self.secret.as_deref(), signature, timestamp, body)?;
        parse_notification(body)
    }

    /// Process a verified notification
    pub async fn handle(&self, notification: PaymentNotification) -> Result<WebhookOutcome> {
        tracing::info!(
            kind = ?notification.kind,
            session_id = ?notification.session_id,
            payment_id = ?notification.payment_id,
            "Processing PingPay webhook"
        );

        let purchase = self.locate(&notification).await?;

        if purchase.payment_status == PaymentStatus::Completed {
            tracing::debug!(purchase_id = %purchase.id, "Webhook for completed purchase ignored");
            return Ok(WebhookOutcome::AlreadyProcessed);
        }

        let Some(signal) = notification.kind.signal() else {
            tracing::debug!(kind = ?notification.kind, "Webhook acknowledged without action");
            return Ok(WebhookOutcome::Acknowledged);
        };

        let settlement = self
            .reconciler
            .settle(&purchase, signal, notification.payment_id.as_deref())
            .await?;

        Ok(WebhookOutcome::Settled {
            status: settlement.status,
            written: settlement.written,
        })
    }

    /// Verify, parse and process one delivery
    pub async fn process(
        &self,
        body: &[u8],
        signature: Option<&str>,
        timestamp: Option<&str>,
    ) -> Result<WebhookOutcome> {
        let notification = self.parse_event(body, signature, timestamp)?;
        self.handle(notification).await
    }

    /// Session id first, then payment id
    async fn locate(&self, notification: &PaymentNotification) -> Result<Purchase> {
        let store = self.reconciler.store();

        if let Some(session_id) = notification.session_id.as_deref() {
            if let Some(purchase) = store.find_by_session(session_id).await? {
                return Ok(purchase);
            }
        }

        if let Some(payment_id) = notification.payment_id.as_deref() {
            if let Some(purchase) = store.find_by_payment(payment_id).await? {
                return Ok(purchase);
            }
        }

        tracing::warn!(
            session_id = ?notification.session_id,
            payment_id = ?notification.payment_id,
            "Webhook purchase not found"
        );
        Err(PaymentError::OrderNotFound)
    }
}
