//! Payment Status Poller
//!
//! Repeatedly asks the server for a purchase's status until it settles.
//! The webhook may land before, after, or never relative to these polls;
//! the server answers from whichever channel settled first.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use bookstore_payments::PaymentStatus;

/// One answer from the status endpoint
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StatusProbe {
    Status {
        status: PaymentStatus,
        book_title: Option<String>,
    },
    /// 404; the purchase row may not be visible yet
    NotFound,
    /// 401; the session may still be restoring
    Unauthenticated,
    /// Transport error or unexpected response
    Transient,
}

/// Where probes come from
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn probe(&self, session_id: &str) -> StatusProbe;
}

/// Final state shown to the buyer
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    Completed { book_title: Option<String> },
    Failed,
    NotFound,
    /// Timed out while still pending. Not an error.
    StillProcessing,
}

#[derive(Clone, Debug)]
pub struct PollerConfig {
    pub interval: Duration,
    pub timeout: Duration,
    /// Consecutive 404s before giving up
    pub not_found_limit: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            timeout: Duration::from_secs(5 * 60),
            not_found_limit: 10,
        }
    }
}

pub struct PaymentPoller {
    source: Arc<dyn StatusSource>,
    config: PollerConfig,
}

impl PaymentPoller {
    pub fn new(source: Arc<dyn StatusSource>) -> Self {
        Self::with_config(source, PollerConfig::default())
    }

    pub const fn with_config(source: Arc<dyn StatusSource>, config: PollerConfig) -> Self {
        Self { source, config }
    }

    /// Poll until the purchase settles or the overall timeout elapses
    pub async fn run(&self, session_id: &str) -> PollOutcome {
        if let Ok(outcome) = tokio::time::timeout(self.config.timeout, self.poll(session_id)).await {
            outcome
        } else {
            tracing::info!(session_id, "Payment still processing after timeout");
            PollOutcome::StillProcessing
        }
    }

    async fn poll(&self, session_id: &str) -> PollOutcome {
        let mut not_found = 0_u32;
        let mut title = None;

        loop {
            match self.source.probe(session_id).await {
                StatusProbe::Status { status, book_title } => {
                    if book_title.is_some() {
                        title = book_title;
                    }
                    match status {
                        PaymentStatus::Completed => {
                            return PollOutcome::Completed { book_title: title };
                        }
                        PaymentStatus::Failed => return PollOutcome::Failed,
                        PaymentStatus::Pending => not_found = 0,
                    }
                }
                StatusProbe::NotFound => {
                    not_found += 1;
                    if not_found >= self.config.not_found_limit {
                        tracing::warn!(session_id, not_found, "Purchase not found, giving up");
                        return PollOutcome::NotFound;
                    }
                }
                StatusProbe::Unauthenticated => {
                    tracing::debug!(session_id, "Status check unauthenticated, retrying");
                }
                StatusProbe::Transient => {
                    tracing::debug!(session_id, "Status check failed, retrying");
                }
            }

            tokio::time::sleep(self.config.interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Replays a script, then answers `pending` forever
    struct ScriptedSource {
        script: Mutex<VecDeque<StatusProbe>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(script: impl IntoIterator<Item = StatusProbe>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into_iter().collect()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StatusSource for ScriptedSource {
        async fn probe(&self, _session_id: &str) -> StatusProbe {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| pending(None))
        }
    }

    fn pending(title: Option<&str>) -> StatusProbe {
        StatusProbe::Status {
            status: PaymentStatus::Pending,
            book_title: title.map(String::from),
        }
    }

    fn settled(status: PaymentStatus, title: Option<&str>) -> StatusProbe {
        StatusProbe::Status {
            status,
            book_title: title.map(String::from),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_completes_after_pending() {
        let source = ScriptedSource::new([
            pending(None),
            pending(None),
            settled(PaymentStatus::Completed, Some("Programming Rust")),
        ]);
        let poller = PaymentPoller::new(source.clone());

        let start = tokio::time::Instant::now();
        let outcome = poller.run("cs_1").await;

        assert_eq!(
            outcome,
            PollOutcome::Completed {
                book_title: Some("Programming Rust".into())
            }
        );
        assert_eq!(source.calls(), 3);
        assert!(start.elapsed() >= Duration::from_secs(6));
        assert!(start.elapsed() < Duration::from_secs(9));
    }

    #[tokio::test(start_paused = true)]
    async fn test_title_from_earlier_poll_is_kept() {
        let source = ScriptedSource::new([
            pending(Some("Rust in Action")),
            settled(PaymentStatus::Completed, None),
        ]);

        let outcome = PaymentPoller::new(source).run("cs_1").await;
        assert_eq!(
            outcome,
            PollOutcome::Completed {
                book_title: Some("Rust in Action".into())
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed() {
        let source = ScriptedSource::new([pending(None), settled(PaymentStatus::Failed, None)]);
        assert_eq!(PaymentPoller::new(source).run("cs_1").await, PollOutcome::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_not_found_after_limit() {
        let source = ScriptedSource::new(std::iter::repeat_n(StatusProbe::NotFound, 20));
        let outcome = PaymentPoller::new(source.clone()).run("cs_1").await;

        assert_eq!(outcome, PollOutcome::NotFound);
        assert_eq!(source.calls(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_resets_not_found_count() {
        let mut script: Vec<_> = std::iter::repeat_n(StatusProbe::NotFound, 9).collect();
        script.push(pending(None));
        script.extend(std::iter::repeat_n(StatusProbe::NotFound, 9));
        script.push(settled(PaymentStatus::Completed, None));

        let outcome = PaymentPoller::new(ScriptedSource::new(script)).run("cs_1").await;
        assert_eq!(outcome, PollOutcome::Completed { book_title: None });
    }

    #[tokio::test(start_paused = true)]
    async fn test_unauthenticated_and_transient_keep_polling() {
        let source = ScriptedSource::new([
            StatusProbe::Unauthenticated,
            StatusProbe::Transient,
            StatusProbe::Unauthenticated,
            settled(PaymentStatus::Completed, None),
        ]);

        let outcome = PaymentPoller::new(source.clone()).run("cs_1").await;
        assert_eq!(outcome, PollOutcome::Completed { book_title: None });
        assert_eq!(source.calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_still_processing() {
        let source = ScriptedSource::new(Vec::<StatusProbe>::new());
        let poller = PaymentPoller::with_config(
            source.clone(),
            PollerConfig {
                interval: Duration::from_secs(3),
                timeout: Duration::from_secs(30),
                not_found_limit: 10,
            },
        );

        let start = tokio::time::Instant::now();
        let outcome = poller.run("cs_1").await;

        assert_eq!(outcome, PollOutcome::StillProcessing);
        assert!(start.elapsed() >= Duration::from_secs(30));
        assert!(source.calls() >= 10);
    }
}
