//! Checkpoint decisions.

use crate::step::StepName;
use crate::tool::ToolResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What to do after a checkpointed step.
///
/// Serialized with a `decision` tag so remote approvers can send it as JSON:
///
/// ```
/// use hataori_core::Decision;
///
/// let decision: Decision =
///     serde_json::from_str(r#"{"decision": "rewind", "target": "search"}"#).unwrap();
/// assert_eq!(decision, Decision::rewind("search"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    /// Continue with the next step.
    Approve,
    /// Run the same step again with feedback for the model.
    Revise {
        /// Guidance for the retried attempt.
        feedback: String,
    },
    /// Go back to an earlier step, restoring the state it started from.
    Rewind {
        /// The step to resume from.
        target: StepName,
    },
    /// End the run.
    Stop,
}

impl Decision {
    /// Creates a revise decision.
    pub fn revise(feedback: impl Into<String>) -> Self {
        Decision::Revise {
            feedback: feedback.into(),
        }
    }

    /// Creates a rewind decision.
    pub fn rewind(target: impl Into<StepName>) -> Self {
        Decision::Rewind {
            target: target.into(),
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Approve => write!(f, "approve"),
            Decision::Revise { .. } => write!(f, "revise"),
            Decision::Rewind { target } => write!(f, "rewind to '{}'", target),
            Decision::Stop => write!(f, "stop"),
        }
    }
}

/// Decides what happens after a checkpointed step.
///
/// The engine waits for the returned decision without a timeout; handlers
/// that talk to slow approvers should enforce their own and return
/// [`Decision::Stop`] when it expires.
#[async_trait]
pub trait CheckpointHandler: Send + Sync {
    /// Inspects the step result and returns a decision.
    async fn handle(&self, step_name: &StepName, result: &ToolResult) -> Decision;
}
