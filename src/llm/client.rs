//! Completion dispatch with per-provider throttling and 429 backoff

use super::adapters::{build_request, extract_reply};
use super::provider::{Provider, ProviderConfig};
use super::retry::{is_rate_limited, RetryPolicy};
use super::transport::HttpTransport;
use super::{CompletionError, CompletionNotice};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Last dispatch time for one provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitWindow {
    pub last_dispatch: Option<Instant>,
    pub min_interval: Duration,
}

impl RateLimitWindow {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            last_dispatch: None,
            min_interval,
        }
    }

    /// Time still to wait at `now`, if any
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        let last = self.last_dispatch?;
        let elapsed = now.saturating_duration_since(last);
        self.min_interval
            .checked_sub(elapsed)
            .filter(|wait| !wait.is_zero())
    }

    /// Claim the next send slot at or after `now`.
    ///
    /// The slot is recorded immediately, so a later caller queues behind it.
    pub fn reserve(&mut self, now: Instant) -> Instant {
        let send_at = now + self.remaining(now).unwrap_or(Duration::ZERO);
        self.last_dispatch = Some(send_at);
        send_at
    }

    /// Record a send at `now` without moving an existing reservation back
    pub fn record(&mut self, now: Instant) {
        self.last_dispatch = Some(self.last_dispatch.map_or(now, |last| last.max(now)));
    }
}

pub struct CompletionClient {
    transport: Arc<dyn HttpTransport>,
    retry: RetryPolicy,
    windows: Mutex<HashMap<Provider, RateLimitWindow>>,
}

impl CompletionClient {
    pub fn new(transport: Arc<dyn HttpTransport>, retry: RetryPolicy) -> Self {
        Self {
            transport,
            retry,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// When the last request to `provider` went out
    pub fn last_dispatch(&self, provider: Provider) -> Option<Instant> {
        self.windows
            .lock()
            .get(&provider)
            .and_then(|window| window.last_dispatch)
    }

    /// Ask `provider` to answer `text`.
    ///
    /// `notify` receives throttling and retry notices as they happen.
    pub async fn complete<F>(
        &self,
        text: &str,
        provider: &ProviderConfig,
        notify: F,
    ) -> Result<String, CompletionError>
    where
        F: Fn(CompletionNotice) + Send + Sync,
    {
        let credential = provider
            .credential
            .as_ref()
            .ok_or(CompletionError::MissingCredential(provider.id))?;
        let request = build_request(provider, credential, text)?;

        let now = Instant::now();
        let send_at = self.reserve_slot(provider, now);
        if send_at > now {
            let wait = send_at - now;
            info!("Throttling {}: waiting {:?} before request", provider.id, wait);
            notify(CompletionNotice::Throttling { wait });
            tokio::time::sleep_until(send_at).await;
        }

        let mut attempt = 0;
        loop {
            if attempt > 0 {
                self.mark_dispatched(provider);
            }
            debug!("Dispatching to {} (attempt {})", provider.id, attempt + 1);

            let response = self
                .transport
                .post_json(&request)
                .await
                .map_err(CompletionError::TransportError)?;

            if response.is_success() {
                return extract_reply(provider.shape, &response.body);
            }

            if !is_rate_limited(response.status) {
                warn!("{} returned HTTP {}", provider.id, response.status);
                return Err(CompletionError::ProviderError {
                    status: response.status,
                });
            }

            if attempt >= self.retry.max_retries {
                warn!("{} still rate limited after {} attempts", provider.id, attempt + 1);
                return Err(CompletionError::RateLimited {
                    attempts: attempt + 1,
                });
            }

            let delay = self.retry.delay_for_attempt(attempt);
            attempt += 1;
            info!(
                "Rate limited by {}, retrying in {:?} ({}/{})",
                provider.id, delay, attempt, self.retry.max_retries
            );
            notify(CompletionNotice::RateLimitRetry {
                attempt,
                max_retries: self.retry.max_retries,
                delay,
            });
            tokio::time::sleep(delay).await;
        }
    }

    fn reserve_slot(&self, provider: &ProviderConfig, now: Instant) -> Instant {
        let mut windows = self.windows.lock();
        let window = windows
            .entry(provider.id)
            .or_insert_with(|| RateLimitWindow::new(provider.min_interval));
        window.min_interval = provider.min_interval;
        window.reserve(now)
    }

    fn mark_dispatched(&self, provider: &ProviderConfig) {
        self.windows
            .lock()
            .entry(provider.id)
            .or_insert_with(|| RateLimitWindow::new(provider.min_interval))
            .record(Instant::now());
    }
}
