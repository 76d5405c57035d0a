//! Timeout-only retry with exponential backoff.
//!
//! Only [`NetworkError::Timeout`] is retried. Refused connections, DNS
//! failures and every completed HTTP exchange (including 4xx/5xx) end the
//! sequence immediately.

use super::{BackendRequest, BackendResponse, HttpTransport, NetworkError};
use crate::config::{
    DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_INITIAL_BACKOFF_MS, DEFAULT_MAX_ATTEMPTS,
    DEFAULT_REQUEST_TIMEOUT_SECS,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_retry::RetryIf;
use tracing::{debug, warn};

/// Retry schedule for one backend. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_backoff: Duration,
    backoff_multiplier: f64,
    per_attempt_timeout: Duration,
}

impl RetryPolicy {
    /// Create a policy. `max_attempts` is clamped to at least 1 and the
    /// multiplier to at least 1.0 so backoff never shrinks.
    #[must_use]
    pub fn new(
        max_attempts: u32,
        initial_backoff: Duration,
        backoff_multiplier: f64,
        per_attempt_timeout: Duration,
    ) -> Self {
        let backoff_multiplier = if backoff_multiplier.is_finite() {
            backoff_multiplier.max(1.0)
        } else {
            1.0
        };
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
            backoff_multiplier,
            per_attempt_timeout,
        }
    }

    /// Total attempts, including the first one
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Timeout applied to each individual attempt
    #[must_use]
    pub const fn per_attempt_timeout(&self) -> Duration {
        self.per_attempt_timeout
    }

    /// Sleep before attempt `n + 1`, for `n` in `1..max_attempts`.
    ///
    /// `initial_backoff * multiplier^(n - 1)`
    #[must_use]
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        self.initial_backoff
            .mul_f64(self.backoff_multiplier.powi(exponent).min(1e6))
    }

    /// The sleeps between attempts; yields `max_attempts - 1` items.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (1..self.max_attempts).map(|attempt| self.backoff_after(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(
            DEFAULT_MAX_ATTEMPTS,
            Duration::from_millis(DEFAULT_INITIAL_BACKOFF_MS),
            DEFAULT_BACKOFF_MULTIPLIER,
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }
}

/// Executes requests over an [`HttpTransport`] following a [`RetryPolicy`]
#[derive(Clone)]
pub struct RetryingClient {
    transport: Arc<dyn HttpTransport>,
}

impl RetryingClient {
    /// Wrap a transport
    #[must_use]
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self { transport }
    }

    /// Run `request` until it completes, fails with a non-timeout error,
    /// or the policy's attempts are exhausted.
    ///
    /// # Errors
    ///
    /// Returns the non-timeout error as soon as it happens, or the last
    /// timeout once every attempt has timed out.
    pub async fn execute(
        &self,
        request: &BackendRequest,
        policy: &RetryPolicy,
    ) -> Result<BackendResponse, NetworkError> {
        let transport = &self.transport;
        let timeout = policy.per_attempt_timeout();
        let attempt = AtomicU32::new(0);

        RetryIf::spawn(
            policy.delays().collect::<Vec<_>>(),
            || {
                let current = attempt.fetch_add(1, Ordering::Relaxed) + 1;
                debug!(
                    method = %request.method,
                    url = %request.url,
                    attempt = current,
                    "Sending backend request"
                );
                transport.send(request, timeout)
            },
            |error: &NetworkError| {
                let current = attempt.load(Ordering::Relaxed);
                let retry = will_retry(error, current, policy.max_attempts());
                if retry {
                    warn!(
                        url = %request.url,
                        attempt = current,
                        "Backend request timed out, retrying: {error}"
                    );
                }
                retry
            },
        )
        .await
        .inspect_err(|e| {
            warn!(
                url = %request.url,
                max_attempts = policy.max_attempts(),
                "Backend request failed: {e}"
            );
        })
    }
}

/// A failed attempt is followed by another only when it timed out and the
/// policy has attempts left.
const fn will_retry(error: &NetworkError, attempt: u32, max_attempts: u32) -> bool {
    error.is_timeout() && attempt < max_attempts
}
