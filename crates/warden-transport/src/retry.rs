//! Bounded retries for replayable requests.

use async_trait::async_trait;
use tracing::debug;
use warden_core::defaults::DEFAULT_RETRY_ATTEMPTS;

use crate::error::FetchError;
use crate::request::FetchRequest;
use crate::{Fetch, FetchResponse};

/// Retries a replayable request while the inner transport fails with a
/// connection-level error, up to `max_attempts` tries in total.
///
/// Non-replayable requests pass through with exactly one attempt. Holds no
/// mutable state.
#[derive(Debug, Clone)]
pub struct RetryTransport<T> {
    inner: T,
    max_attempts: u32,
}

impl<T> RetryTransport<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            max_attempts: DEFAULT_RETRY_ATTEMPTS,
        }
    }

    /// Set the total number of tries (at least one).
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

#[async_trait]
impl<T: Fetch> Fetch for RetryTransport<T> {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
        if !request.is_replayable() {
            return self.inner.fetch(request).await;
        }

        let mut attempt = 1;
        loop {
            match self.inner.fetch(request).await {
                Err(e)
                    if e.is_redial_worthy()
                        && attempt < self.max_attempts
                        && !request.is_canceled() =>
                {
                    debug!(attempt, error = %e, uri = %request.uri(), "retrying request");
                    warden_metrics::record_retry();
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}
