//! Retry policy with exponential backoff
//!
//! Only idempotent verbs are retried, and only on gateway-class statuses
//! (502, 503, 504). Delays follow `slice * 2^min(attempt, ceiling)`.

use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use reqwest::{Method, StatusCode};

use crate::http::config::HttpClientConfig;

/// Highest exponent applied to the backoff slice
pub const EXPONENTIAL_BACKOFF_CEILING: u32 = 10;

/// Base unit of the backoff delay
pub const EXPONENTIAL_BACKOFF_TIME_SLICE: Duration = Duration::from_millis(5);

/// Verbs eligible for automatic retry
pub fn is_retryable_verb(method: &Method) -> bool {
    matches!(
        *method,
        Method::OPTIONS | Method::GET | Method::DELETE | Method::HEAD
    )
}

/// Statuses that trigger a retry
pub fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
    )
}

/// Statuses followed as redirects
pub fn is_redirect_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    )
}

/// Retry policy for one logical call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    pub time_slice: Duration,
    pub ceiling: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            time_slice: EXPONENTIAL_BACKOFF_TIME_SLICE,
            ceiling: EXPONENTIAL_BACKOFF_CEILING,
        }
    }
}

impl RetryPolicy {
    /// Policy allowing `max_attempts` attempts in total
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Default::default()
        }
    }

    /// Policy for `method` under the client configuration
    pub fn for_request(config: &HttpClientConfig, method: &Method) -> Self {
        if config.allow_retries && is_retryable_verb(method) {
            Self::new(config.max_retries.saturating_add(1))
        } else {
            Self::new(1)
        }
    }

    pub fn with_time_slice(mut self, slice: Duration) -> Self {
        self.time_slice = slice;
        self
    }

    /// Delay before retry number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.time_slice * 2u32.pow(attempt.min(self.ceiling))
    }

    /// Create an exponential backoff yielding `delay_for(1)`, `delay_for(2)`, ...
    pub fn create_backoff(&self) -> ExponentialBackoff {
        let mut backoff = ExponentialBackoff {
            current_interval: self.delay_for(1),
            initial_interval: self.delay_for(1),
            randomization_factor: 0.0,
            multiplier: 2.0,
            max_interval: self.delay_for(self.ceiling),
            max_elapsed_time: None, // attempts are bounded separately
            ..Default::default()
        };
        backoff.reset();
        backoff
    }
}

/// Decision after an attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again after the delay
    Retry { delay: Duration },
    /// Keep the response
    NoRetry,
}

/// Retry state of one logical call
#[derive(Debug)]
pub struct RetryHandler {
    policy: RetryPolicy,
    attempts: u32,
    backoff: ExponentialBackoff,
}

impl RetryHandler {
    pub fn new(policy: RetryPolicy) -> Self {
        let backoff = policy.create_backoff();
        Self {
            policy,
            attempts: 0,
            backoff,
        }
    }

    /// Record a finished attempt and decide whether to try again
    pub fn record_attempt(&mut self, status: StatusCode) -> RetryDecision {
        if !is_retryable_status(status) {
            return RetryDecision::NoRetry;
        }

        self.attempts += 1;
        if self.attempts >= self.policy.max_attempts {
            log::debug!(
                "Retry budget exhausted after {} attempts, last status {}",
                self.attempts,
                status
            );
            return RetryDecision::NoRetry;
        }

        let delay = self
            .backoff
            .next_backoff()
            .unwrap_or_else(|| self.policy.delay_for(self.attempts));
        RetryDecision::Retry { delay }
    }

    /// Retryable attempts recorded so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}
