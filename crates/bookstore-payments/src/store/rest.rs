//! PostgREST-backed purchase store
//!
//! Talks to the hosted database over its REST interface. Row-level
//! atomicity comes from filtered `PATCH` requests: a write only lands when
//! the filter still matches, and `return=representation` tells us whether
//! it did.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::PurchaseStore;
use crate::error::{PaymentError, Result};
use crate::model::{
    Book, BookId, CURRENCY, PaymentStatus, PendingPurchase, Purchase, PurchaseId, UpsertOutcome,
    UserId,
};

const BOOKS: &str = "books";
const PURCHASES: &str = "purchases";

/// Connection settings for the REST data store
#[derive(Clone, Debug)]
pub struct RestStoreConfig {
    /// Project URL, no trailing slash
    pub url: String,

    /// Service-role key; bypasses row-level security
    pub service_key: String,
}

impl RestStoreConfig {
    /// Create from environment variables. `None` when `STORE_URL` is unset.
    pub fn from_env() -> Result<Option<Self>> {
        let Some(url) = std::env::var("STORE_URL").ok().filter(|s| !s.is_empty()) else {
            return Ok(None);
        };
        let service_key = std::env::var("STORE_SERVICE_KEY")
            .map_err(|_| PaymentError::Config("STORE_SERVICE_KEY not set".into()))?;

        Ok(Some(Self {
            url: url.trim_end_matches('/').to_string(),
            service_key,
        }))
    }
}

/// Purchase store over a PostgREST endpoint
pub struct RestPurchaseStore {
    http: Client,
    config: RestStoreConfig,
}

#[derive(Serialize)]
struct RefreshRow<'a> {
    session_id: &'a str,
    /// Always sent; `null` clears the abandoned session's payment id
    payment_id: Option<&'a str>,
    payment_status: PaymentStatus,
    amount: rust_decimal::Decimal,
}

#[derive(Serialize)]
struct InsertRow<'a> {
    user_id: &'a UserId,
    book_id: &'a BookId,
    session_id: &'a str,
    payment_id: Option<&'a str>,
    payment_status: PaymentStatus,
    amount: rust_decimal::Decimal,
    currency: &'a str,
}

impl RestPurchaseStore {
    pub fn new(config: RestStoreConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    fn table(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.config.url, table)
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.config.service_key)
            .bearer_auth(&self.config.service_key)
    }

    async fn select_one<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[(&str, String)],
    ) -> Result<Option<T>> {
        let response = self
            .authed(self.http.get(self.table(table)))
            .query(&[("select", "*"), ("limit", "1")])
            .query(filters)
            .send()
            .await
            .map_err(|e| PaymentError::Storage(e.to_string()))?;

        let rows: Vec<T> = read_rows(response, PaymentError::Storage).await?;
        Ok(rows.into_iter().next())
    }

    async fn patch<B: Serialize + Sync>(
        &self,
        filters: &[(&str, String)],
        body: &B,
    ) -> Result<Vec<Purchase>> {
        let response = self
            .authed(self.http.patch(self.table(PURCHASES)))
            .query(filters)
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await
            .map_err(|e| PaymentError::StoreWrite(e.to_string()))?;

        read_rows(response, PaymentError::StoreWrite).await
    }

    async fn refresh(&self, pending: &PendingPurchase) -> Result<Option<Purchase>> {
        let rows = self
            .patch(
                &[
                    ("user_id", eq(pending.user_id.as_str())),
                    ("book_id", eq(pending.book_id.as_str())),
                    ("payment_status", format!("neq.{}", PaymentStatus::Completed)),
                ],
                &RefreshRow {
                    session_id: &pending.session_id,
                    payment_id: pending.payment_id.as_deref(),
                    payment_status: PaymentStatus::Pending,
                    amount: pending.amount,
                },
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn insert(&self, pending: &PendingPurchase) -> Result<Option<Purchase>> {
        let response = self
            .authed(self.http.post(self.table(PURCHASES)))
            .query(&[("on_conflict", "user_id,book_id")])
            .header("Prefer", "return=representation,resolution=ignore-duplicates")
            .json(&InsertRow {
                user_id: &pending.user_id,
                book_id: &pending.book_id,
                session_id: &pending.session_id,
                payment_id: pending.payment_id.as_deref(),
                payment_status: PaymentStatus::Pending,
                amount: pending.amount,
                currency: CURRENCY,
            })
            .send()
            .await
            .map_err(|e| PaymentError::StoreWrite(e.to_string()))?;

        let rows: Vec<Purchase> = read_rows(response, PaymentError::StoreWrite).await?;
        Ok(rows.into_iter().next())
    }
}

type Filters = Vec<(&'static str, String)>;

/// Conditional PATCHes for a terminal write, tried in order until one
/// returns a row
///
/// Status and payment id land in one request whenever the payment id can
/// still be filled; otherwise only the status is written.
fn outcome_patches(
    id: &PurchaseId,
    status: PaymentStatus,
    payment_id: Option<&str>,
) -> Vec<(Filters, serde_json::Value)> {
    let pending = || {
        vec![
            ("id", eq(id.as_str())),
            ("payment_status", eq(PaymentStatus::Pending.as_str())),
        ]
    };

    let mut patches = Vec::with_capacity(2);
    if let Some(payment_id) = payment_id {
        let mut filters = pending();
        filters.push(("payment_id", "is.null".to_string()));
        patches.push((
            filters,
            serde_json::json!({ "payment_status": status, "payment_id": payment_id }),
        ));
    }
    patches.push((pending(), serde_json::json!({ "payment_status": status })));
    patches
}

fn eq(value: &str) -> String {
    format!("eq.{value}")
}

async fn read_rows<T: DeserializeOwned>(
    response: Response,
    wrap: fn(String) -> PaymentError,
) -> Result<Vec<T>> {
    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        return Err(wrap(format!("{status}: {text}")));
    }
    response.json().await.map_err(|e| wrap(e.to_string()))
}

#[async_trait]
impl PurchaseStore for RestPurchaseStore {
    async fn get_book(&self, id: &BookId) -> Result<Option<Book>> {
        self.select_one(BOOKS, &[("id", eq(id.as_str()))]).await
    }

    async fn find_purchase(&self, user_id: &UserId, book_id: &BookId) -> Result<Option<Purchase>> {
        self.select_one(
            PURCHASES,
            &[
                ("user_id", eq(user_id.as_str())),
                ("book_id", eq(book_id.as_str())),
            ],
        )
        .await
    }

    async fn get_purchase(&self, id: &PurchaseId) -> Result<Option<Purchase>> {
        self.select_one(PURCHASES, &[("id", eq(id.as_str()))]).await
    }

    async fn find_by_session(&self, session_id: &str) -> Result<Option<Purchase>> {
        self.select_one(PURCHASES, &[("session_id", eq(session_id))])
            .await
    }

    async fn find_by_payment(&self, payment_id: &str) -> Result<Option<Purchase>> {
        self.select_one(PURCHASES, &[("payment_id", eq(payment_id))])
            .await
    }

    async fn upsert_pending(&self, pending: PendingPurchase) -> Result<UpsertOutcome> {
        if let Some(purchase) = self.refresh(&pending).await? {
            return Ok(UpsertOutcome::Refreshed(purchase));
        }

        if let Some(purchase) = self.insert(&pending).await? {
            return Ok(UpsertOutcome::Inserted(purchase));
        }

        // Insert was ignored: another request created the row in between.
        if let Some(purchase) = self.refresh(&pending).await? {
            return Ok(UpsertOutcome::Refreshed(purchase));
        }

        match self.find_purchase(&pending.user_id, &pending.book_id).await? {
            Some(p) if p.payment_status == PaymentStatus::Completed => {
                Ok(UpsertOutcome::AlreadyCompleted)
            }
            _ => Err(PaymentError::StoreWrite(format!(
                "could not upsert purchase for user {} book {}",
                pending.user_id, pending.book_id
            ))),
        }
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

        for (filters, body) in outcome_patches(id, status, payment_id) {
            if !self.patch(&filters, &body).await?.is_empty() {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn backend(&self) -> &'static str {
        "rest"
    }
}
