//! Engine configuration.

use hataori_core::{ErrorHandler, ErrorKind, RetryPolicy, WorkflowError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Settings for a [`WorkflowEngine`](crate::WorkflowEngine) or
/// [`AgentRunner`](crate::AgentRunner).
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```
/// use hataori::EngineConfig;
///
/// let config = EngineConfig::from_json(r#"{"call_timeout_secs": 30}"#).unwrap();
/// assert_eq!(config.max_iterations, 10);
/// assert_eq!(config.system_prompt, "You are a helpful assistant.");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Identifies the run in retry keys and state stores.
    pub session_id: String,
    /// Sent as the first message of every model call.
    pub system_prompt: String,
    /// Per-call timeout for model and tool calls; `None` waits forever.
    pub call_timeout_secs: Option<u64>,
    /// Iteration limit of the agent loop.
    pub max_iterations: u32,
    /// Also persist rewind snapshots when a state store is configured.
    pub persist_snapshots: bool,
    /// The user on whose behalf the run executes.
    pub user_id: Option<String>,
    /// Overrides of the default retry policy per error kind.
    pub retry_policies: HashMap<ErrorKind, RetryPolicy>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            system_prompt: "You are a helpful assistant.".to_string(),
            call_timeout_secs: None,
            max_iterations: 10,
            persist_snapshots: false,
            user_id: None,
            retry_policies: HashMap::new(),
        }
    }
}

impl EngineConfig {
    /// Parses a configuration from JSON and validates it.
    pub fn from_json(json: &str) -> Result<Self, WorkflowError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every configured retry policy.
    pub fn validate(&self) -> Result<(), WorkflowError> {
        self.retry_policies.values().try_for_each(RetryPolicy::validate)
    }

    /// Sets the session id.
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    /// Sets the system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Sets the per-call timeout.
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout_secs = Some(timeout.as_secs());
        self
    }

    /// Sets the agent loop iteration limit.
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Enables snapshot persistence.
    pub fn with_persisted_snapshots(mut self) -> Self {
        self.persist_snapshots = true;
        self
    }

    /// Overrides the retry policy for one error kind.
    pub fn with_retry_policy(mut self, kind: ErrorKind, policy: RetryPolicy) -> Self {
        self.retry_policies.insert(kind, policy);
        self
    }

    /// A fresh error handler applying the configured overrides.
    pub fn error_handler(&self) -> ErrorHandler {
        self.retry_policies
            .iter()
            .fold(ErrorHandler::new(), |handler, (kind, policy)| {
                handler.with_policy(*kind, policy.clone())
            })
    }

    /// The per-call timeout as a [`Duration`].
    pub fn call_timeout(&self) -> Option<Duration> {
        self.call_timeout_secs.map(Duration::from_secs)
    }
}
