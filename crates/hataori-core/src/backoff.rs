//! Error classification and retry back-off.
//!
//! [`ErrorHandler`] classifies a failure into an [`ErrorKind`], looks up the
//! [`RetryPolicy`] for that kind and counts attempts per [`ContextKey`].

use crate::context::ContextKey;
use crate::error::WorkflowError;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Coarse failure category used to pick a retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The provider throttled the caller.
    RateLimit,
    /// The call did not answer in time.
    Timeout,
    /// The answer did not have the expected shape.
    InvalidResponse,
    /// A tool failed while executing.
    ToolExecution,
    /// The provider answered with an error status.
    ApiError,
    /// Nothing matched.
    Unknown,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::Timeout => "timeout",
            ErrorKind::InvalidResponse => "invalid_response",
            ErrorKind::ToolExecution => "tool_execution",
            ErrorKind::ApiError => "api_error",
            ErrorKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Classifies an error message by case-insensitive substring matching.
///
/// Best effort only: the first matching rule wins.
///
/// ```
/// use hataori_core::{classify, ErrorKind};
///
/// assert_eq!(classify("HTTP 429 Too Many Requests"), ErrorKind::RateLimit);
/// assert_eq!(classify("request Timeout"), ErrorKind::Timeout);
/// assert_eq!(classify("validation failed"), ErrorKind::InvalidResponse);
/// assert_eq!(classify("status 503"), ErrorKind::Unknown);
/// ```
pub fn classify(message: &str) -> ErrorKind {
    let message = message.to_lowercase();
    let has = |needle: &str| message.contains(needle);

    if has("rate") || has("429") {
        ErrorKind::RateLimit
    } else if has("timeout") {
        ErrorKind::Timeout
    } else if has("invalid") || has("validation") {
        ErrorKind::InvalidResponse
    } else if has("401") || has("403") || has("500") {
        ErrorKind::ApiError
    } else {
        ErrorKind::Unknown
    }
}

/// How many times, and how patiently, one kind of failure is retried.
///
/// Delays serialize as fractional seconds:
///
/// ```
/// use hataori_core::RetryPolicy;
/// use std::time::Duration;
///
/// let policy: RetryPolicy =
///     serde_json::from_str(r#"{"type": "exponential", "max_retries": 4, "base_delay": 0.5}"#)
///         .unwrap();
/// assert_eq!(policy, RetryPolicy::exponential(4, Duration::from_millis(500)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RetryPolicy {
    /// Give up on the first failure.
    Never,
    /// Same delay before every retry.
    Fixed {
        /// Failure count at which the handler gives up.
        max_retries: u32,
        /// Delay before each retry.
        #[serde(with = "secs")]
        delay: Duration,
    },
    /// Delay doubles before every retry.
    Exponential {
        /// Failure count at which the handler gives up.
        max_retries: u32,
        /// Delay before the first retry.
        #[serde(with = "secs")]
        base_delay: Duration,
        /// Upper bound for any single delay.
        #[serde(with = "secs", default = "default_max_delay")]
        max_delay: Duration,
    },
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(delay: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(delay.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

impl RetryPolicy {
    /// Retries up to `max_retries` with a constant delay.
    pub fn fixed(max_retries: u32, delay: Duration) -> Self {
        RetryPolicy::Fixed { max_retries, delay }
    }

    /// Retries up to `max_retries`, doubling from `base_delay` with a 60s cap.
    pub fn exponential(max_retries: u32, base_delay: Duration) -> Self {
        RetryPolicy::Exponential {
            max_retries,
            base_delay,
            max_delay: default_max_delay(),
        }
    }

    /// Rejects an exponential policy whose cap is below its first delay.
    pub fn validate(&self) -> Result<(), WorkflowError> {
        match self {
            RetryPolicy::Exponential {
                base_delay,
                max_delay,
                ..
            } if max_delay < base_delay => Err(WorkflowError::Configuration(format!(
                "max_delay ({max_delay:?}) is shorter than base_delay ({base_delay:?})"
            ))),
            _ => Ok(()),
        }
    }

    /// Failure count at which the handler gives up.
    pub fn max_retries(&self) -> u32 {
        match self {
            RetryPolicy::Never => 0,
            RetryPolicy::Fixed { max_retries, .. } | RetryPolicy::Exponential { max_retries, .. } => {
                *max_retries
            }
        }
    }

    /// Delay before the retry following the `failure`-th failure (1-based).
    pub fn delay_after(&self, failure: u32) -> Duration {
        match self {
            RetryPolicy::Never => Duration::ZERO,
            RetryPolicy::Fixed { delay, .. } => *delay,
            RetryPolicy::Exponential {
                base_delay,
                max_delay,
                ..
            } => {
                let factor = 1u32
                    .checked_shl(failure.saturating_sub(1))
                    .unwrap_or(u32::MAX);
                base_delay.saturating_mul(factor).min(*max_delay)
            }
        }
    }

    /// Default policy for an error kind.
    pub fn default_for(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::RateLimit => RetryPolicy::exponential(5, Duration::from_secs(5)),
            ErrorKind::Timeout => RetryPolicy::fixed(3, Duration::from_secs(2)),
            ErrorKind::InvalidResponse => RetryPolicy::fixed(3, Duration::ZERO),
            ErrorKind::ToolExecution => RetryPolicy::fixed(2, Duration::ZERO),
            ErrorKind::ApiError => RetryPolicy::exponential(3, Duration::from_secs(1)),
            ErrorKind::Unknown => RetryPolicy::exponential(3, Duration::from_secs(1)),
        }
    }
}

/// What the caller should do after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait, then try again.
    Retry {
        /// Delay before the next attempt.
        wait: Duration,
        /// Failures counted so far under this key.
        attempt: u32,
    },
    /// The retry budget is spent.
    GiveUp {
        /// Failures counted under this key.
        attempts: u32,
    },
}

impl RetryDecision {
    /// Returns `true` if the caller should retry.
    pub fn should_retry(&self) -> bool {
        matches!(self, RetryDecision::Retry { .. })
    }

    /// Delay before the next attempt; zero when giving up.
    pub fn wait(&self) -> Duration {
        match self {
            RetryDecision::Retry { wait, .. } => *wait,
            RetryDecision::GiveUp { .. } => Duration::ZERO,
        }
    }
}

/// Classifies failures and tracks retry budgets per context key.
///
/// The attempt counters live in a concurrent map, so one handler can be
/// shared between runs as long as their keys do not collide.
///
/// # Examples
///
/// ```
/// use hataori_core::{ErrorHandler, WorkflowError};
/// use std::time::Duration;
///
/// let handler = ErrorHandler::new();
/// let error = WorkflowError::RateLimited("429".to_string());
///
/// let first = handler.handle(&error, "session-1:search");
/// assert!(first.should_retry());
/// assert_eq!(first.wait(), Duration::from_secs(5));
///
/// let second = handler.handle(&error, "session-1:search");
/// assert_eq!(second.wait(), Duration::from_secs(10));
///
/// handler.reset("session-1:search");
/// assert_eq!(handler.attempts("session-1:search"), 0);
/// ```
#[derive(Debug)]
pub struct ErrorHandler {
    policies: HashMap<ErrorKind, RetryPolicy>,
    attempts: DashMap<ContextKey, u32>,
}

impl Default for ErrorHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorHandler {
    /// Creates a handler with the default policy for every kind.
    pub fn new() -> Self {
        let kinds = [
            ErrorKind::RateLimit,
            ErrorKind::Timeout,
            ErrorKind::InvalidResponse,
            ErrorKind::ToolExecution,
            ErrorKind::ApiError,
            ErrorKind::Unknown,
        ];
        Self {
            policies: kinds
                .into_iter()
                .map(|kind| (kind, RetryPolicy::default_for(kind)))
                .collect(),
            attempts: DashMap::new(),
        }
    }

    /// Overrides the policy for one kind.
    pub fn with_policy(mut self, kind: ErrorKind, policy: RetryPolicy) -> Self {
        self.policies.insert(kind, policy);
        self
    }

    /// Returns the policy applied to `kind`.
    pub fn policy(&self, kind: ErrorKind) -> RetryPolicy {
        self.policies
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| RetryPolicy::default_for(ErrorKind::Unknown))
    }

    /// Classifies an error, preferring the kind it signals explicitly.
    pub fn classify(&self, error: &WorkflowError) -> ErrorKind {
        error
            .kind_hint()
            .unwrap_or_else(|| classify(&error.to_string()))
    }

    /// Counts a failure under `key` and decides whether to retry it.
    pub fn handle(&self, error: &WorkflowError, key: impl Into<ContextKey>) -> RetryDecision {
        self.handle_kind(self.classify(error), key)
    }

    /// Same as [`handle`](Self::handle) for an already classified failure.
    pub fn handle_kind(&self, kind: ErrorKind, key: impl Into<ContextKey>) -> RetryDecision {
        let policy = self.policy(kind);
        let attempt = {
            let mut count = self.attempts.entry(key.into()).or_insert(0);
            *count += 1;
            *count
        };

        if attempt >= policy.max_retries() {
            return RetryDecision::GiveUp { attempts: attempt };
        }

        RetryDecision::Retry {
            wait: policy.delay_after(attempt),
            attempt,
        }
    }

    /// Returns the failures counted under `key`.
    pub fn attempts(&self, key: &str) -> u32 {
        self.attempts.get(key).map(|count| *count).unwrap_or(0)
    }

    /// Clears the counter for one key.
    pub fn reset(&self, key: &str) {
        self.attempts.remove(key);
    }

    /// Clears every counter.
    pub fn reset_all(&self) {
        self.attempts.clear();
    }
}
