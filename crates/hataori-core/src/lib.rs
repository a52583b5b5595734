//! Core traits and types for the hataori step engine.
//!
//! This crate provides the data model and collaborator interfaces without an
//! async runtime. Implement [`ModelClient`], [`Tool`] (or [`TypedTool`]),
//! [`CheckpointHandler`] and [`StateStore`] against this crate; the `hataori`
//! crate drives them.
//!
//! # Core Types
//!
//! - [`Workflow`] / [`StepDefinition`] - The linear step sequence
//! - [`RunState`] - Cursor, attempt log, conversation and rewind snapshots
//! - [`Decision`] - Checkpoint outcome: approve, revise, rewind or stop
//! - [`ErrorHandler`] - Error classification and per-key retry budgets
//! - [`WorkflowError`] - Error type shared by the engine and collaborators
//!
//! # Helpers
//!
//! - [`extract_structured`] - JSON from a fenced or bare model reply
//! - [`ResponseValidator`] - Validation with retry prompts

mod backoff;
mod checkpoint;
mod context;
mod error;
mod extract;
mod model;
mod state;
mod step;
mod store;
mod tool;
mod workflow;

pub use backoff::{classify, ErrorHandler, ErrorKind, RetryDecision, RetryPolicy};
pub use checkpoint::{CheckpointHandler, Decision};
pub use context::{ContextKey, ExecutionContext};
pub use error::WorkflowError;
pub use extract::{extract_structured, strip_fence, ResponseValidator, ValidationResult};
pub use model::{
    FinishReason, Message, ModelClient, ModelResponse, ResponseFormat, Role, ToolCall, ToolSpec,
    Usage,
};
pub use state::{Attempt, RunFrame, RunResults, RunState};
pub use step::{StepDefinition, StepName};
pub use store::StateStore;
pub use tool::{Tool, ToolResult, TypedTool};
pub use workflow::{Workflow, WorkflowBuilder};
