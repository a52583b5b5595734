//! Retrying wrapper for external calls.

use hataori_core::{ContextKey, ErrorHandler, RetryDecision, WorkflowError};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Runs an async operation under an optional timeout, retrying failures as
/// the [`ErrorHandler`] decides.
///
/// The retry counter for the key is cleared once the operation succeeds or
/// the handler gives up, so the next call under the same key starts with a
/// full budget.
#[derive(Debug, Clone, Copy)]
pub struct RetryingCaller<'a> {
    handler: &'a ErrorHandler,
    timeout: Option<Duration>,
}

impl<'a> RetryingCaller<'a> {
    /// Creates a caller backed by `handler`.
    pub fn new(handler: &'a ErrorHandler, timeout: Option<Duration>) -> Self {
        Self { handler, timeout }
    }

    /// Calls `operation` until it succeeds or the retry budget is spent.
    ///
    /// `label` names the operation in timeout errors and logs.
    pub async fn call<T, F, Fut>(
        &self,
        key: impl Into<ContextKey>,
        label: &str,
        mut operation: F,
    ) -> Result<T, WorkflowError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, WorkflowError>>,
    {
        let key = key.into();

        loop {
            let outcome = match self.timeout {
                Some(limit) => match timeout(limit, operation()).await {
                    Ok(result) => result,
                    Err(_) => Err(WorkflowError::Timeout {
                        operation: label.to_string(),
                    }),
                },
                None => operation().await,
            };

            let error = match outcome {
                Ok(value) => {
                    self.handler.reset(key.as_str());
                    return Ok(value);
                }
                Err(error) => error,
            };

            match self.handler.handle(&error, key.clone()) {
                RetryDecision::Retry { wait, attempt } => {
                    debug!(
                        "{} failed ({}), retrying in {:?} (attempt {})",
                        label, error, wait, attempt
                    );
                    tokio::time::sleep(wait).await;
                }
                RetryDecision::GiveUp { attempts } => {
                    warn!("{} failed after {} attempts: {}", label, attempts, error);
                    self.handler.reset(key.as_str());
                    return Err(error);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hataori_core::{ErrorKind, RetryPolicy};
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success_then_resets() {
        let handler = ErrorHandler::new();
        let caller = RetryingCaller::new(&handler, None);
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result = caller
            .call("s:a:model", "model call", move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(WorkflowError::RateLimited("slow down".to_string()))
                } else {
                    Ok("done")
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(handler.attempts("s:a:model"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_and_returns_last_error() {
        let handler = ErrorHandler::new();
        let caller = RetryingCaller::new(&handler, None);
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result: Result<(), _> = caller
            .call("k", "tool call", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(WorkflowError::tool("pdf", "disk full"))
            })
            .await;

        assert!(matches!(result, Err(WorkflowError::ToolExecution { .. })));
        // ToolExecution allows two attempts.
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(handler.attempts("k"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_classified() {
        let handler =
            ErrorHandler::new().with_policy(ErrorKind::Timeout, RetryPolicy::Never);
        let caller = RetryingCaller::new(&handler, Some(Duration::from_secs(1)));

        let result: Result<(), _> = caller
            .call("k", "model call", || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;

        match result {
            Err(WorkflowError::Timeout { operation }) => assert_eq!(operation, "model call"),
            other => unreachable!("expected timeout, got {other:?}"),
        }
    }
}
