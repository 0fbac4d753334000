//! Retry policy for transient server errors.

use reqwest::{Method, StatusCode};
use std::time::Duration;

/// Number of retries after the first attempt.
pub const MAX_RETRIES: usize = 3;

/// Base delay for exponential backoff, in milliseconds.
pub const BACKOFF_FACTOR_MS: u64 = 300;

/// Server statuses considered transient.
pub const RETRY_STATUSES: [StatusCode; 2] =
    [StatusCode::BAD_GATEWAY, StatusCode::SERVICE_UNAVAILABLE];

/// Decides which responses and transport failures are retried, and how long to
/// wait between attempts.
///
/// The default policy retries GET and POST requests answered with 502 or 503,
/// up to [`MAX_RETRIES`] times with exponential backoff. Every other
/// (method, status) pair is surfaced to the caller immediately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_retries: usize,
    backoff_factor: Duration,
    methods: Vec<Method>,
    statuses: Vec<StatusCode>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            backoff_factor: Duration::from_millis(BACKOFF_FACTOR_MS),
            methods: vec![Method::GET, Method::POST],
            statuses: RETRY_STATUSES.to_vec(),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_backoff_factor(mut self, backoff_factor: Duration) -> Self {
        self.backoff_factor = backoff_factor;
        self
    }

    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    pub fn backoff_factor(&self) -> Duration {
        self.backoff_factor
    }

    /// Returns true if a `method` request answered with `status` should be sent again.
    pub fn is_retry(&self, method: &Method, status: StatusCode) -> bool {
        self.methods.contains(method) && self.statuses.contains(&status)
    }

    /// Returns true if a transport failure should be retried.
    ///
    /// Only connect failures qualify: the request never reached the server, so
    /// resending it is safe for any method.
    pub fn is_transport_retry(&self, error: &reqwest::Error) -> bool {
        error.is_connect()
    }

    /// Delay before the `retry`-th retry (1-based): `backoff_factor * 2^(retry - 1)`.
    pub fn backoff(&self, retry: usize) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }
        let exponent = (retry - 1).min(16) as u32;
        self.backoff_factor.saturating_mul(1u32 << exponent)
    }
}
