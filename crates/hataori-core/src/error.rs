//! Workflow error types.

use crate::backoff::ErrorKind;
use crate::step::StepName;
use thiserror::Error;

/// Errors raised by the engine and by its collaborators.
///
/// Collaborators (models, tools, stores) report failures with this type so
/// the retry layer can read an explicit [`ErrorKind`] from it; anything else
/// is classified from its message.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum WorkflowError {
    /// A referenced step was not found in the workflow.
    #[error("Step not found: {0}")]
    StepNotFound(StepName),

    /// A step names a tool that is not registered.
    #[error("Tool '{0}' not found")]
    ToolNotFound(String),

    /// Tool arguments do not match the tool's declared input shape.
    #[error("Invalid input for tool '{tool_name}': {details}")]
    InvalidInput {
        /// The tool whose input was rejected.
        tool_name: String,
        /// The validation failure.
        details: String,
    },

    /// A tool failed while executing.
    #[error("Tool '{tool_name}' failed: {details}")]
    ToolExecution {
        /// The tool that failed.
        tool_name: String,
        /// Details about the failure.
        details: String,
    },

    /// The model call failed.
    ///
    /// `kind` lets a client report what it knows about the failure; when it
    /// is `None` the message is classified heuristically.
    #[error("Model call failed: {message}")]
    Model {
        /// Explicit classification from the client, if any.
        kind: Option<ErrorKind>,
        /// Details about the failure.
        message: String,
    },

    /// The provider rejected the call for exceeding its rate limit.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// An external call exceeded its time budget.
    #[error("Timeout occurred in {operation}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
    },

    /// The agent loop ran out of iterations.
    #[error("Max iterations ({limit}) reached")]
    IterationLimit {
        /// The configured limit.
        limit: u32,
    },

    /// The workflow or engine configuration is invalid.
    #[error("Invalid workflow configuration: {0}")]
    Configuration(String),

    /// A state store operation failed.
    #[error("State store error: {0}")]
    Store(String),

    /// JSON (de)serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl WorkflowError {
    /// Creates a model error without an explicit kind.
    pub fn model(message: impl Into<String>) -> Self {
        Self::Model {
            kind: None,
            message: message.into(),
        }
    }

    /// Creates a tool execution error.
    pub fn tool(tool_name: impl Into<String>, details: impl Into<String>) -> Self {
        Self::ToolExecution {
            tool_name: tool_name.into(),
            details: details.into(),
        }
    }

    /// Returns the error kind this error signals explicitly, if any.
    pub fn kind_hint(&self) -> Option<ErrorKind> {
        match self {
            WorkflowError::RateLimited(_) => Some(ErrorKind::RateLimit),
            WorkflowError::Timeout { .. } => Some(ErrorKind::Timeout),
            WorkflowError::InvalidInput { .. } => Some(ErrorKind::InvalidResponse),
            WorkflowError::ToolExecution { .. } => Some(ErrorKind::ToolExecution),
            WorkflowError::Model { kind, .. } => *kind,
            _ => None,
        }
    }
}
