//! A checkpointed, rewindable step engine for tool-using model workflows.
//!
//! A [`Workflow`] is a linear list of steps. Each step either calls a tool,
//! with arguments fixed up front or elicited from the model, or asks the
//! model for a JSON answer. Steps marked as checkpoints pause the run until a
//! [`CheckpointHandler`] decides to approve, revise, rewind or stop.
//!
//! # Example
//!
//! ```rust
//! use hataori::prelude::*;
//! use async_trait::async_trait;
//! use std::sync::Arc;
//!
//! struct Canned;
//!
//! #[async_trait]
//! impl ModelClient for Canned {
//!     async fn call(
//!         &self,
//!         _messages: &[Message],
//!         _tools: &[ToolSpec],
//!         _format: Option<ResponseFormat>,
//!     ) -> Result<ModelResponse, WorkflowError> {
//!         Ok(ModelResponse::text("```json\n{\"sections\": [\"Intro\"]}\n```"))
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), WorkflowError> {
//! let workflow = Workflow::builder("outline")
//!     .step(StepDefinition::model("outline", "Return JSON: {\"sections\": [...]}").checkpoint())
//!     .build()?;
//!
//! let mut engine = WorkflowEngine::builder()
//!     .model(Arc::new(Canned))
//!     .checkpoint(AutoApprove)
//!     .build()?;
//!
//! let results = engine.run(&workflow).await;
//! let outline = results.get("outline").unwrap();
//! assert_eq!(outline.data, Some(serde_json::json!({"sections": ["Intro"]})));
//! # Ok(())
//! # }
//! ```

mod agent;
mod checkpoint;
mod config;
mod delegate;
mod engine;
mod invoke;
mod registry;
mod resolver;
mod retry;
mod store;

// Re-export core types
pub use hataori_core::*;

pub use agent::{Agent, AgentRunner};
pub use checkpoint::{AutoApprove, CallbackApproval, ConsoleApproval};
pub use config::EngineConfig;
pub use delegate::{CallAgentInput, CallAgentTool};
pub use engine::{EngineBuilder, WorkflowEngine};
pub use registry::{AgentRegistry, ToolRegistry};
pub use resolver::{ResolvedInput, ToolInputResolver};
pub use retry::RetryingCaller;
pub use store::{InMemoryStateStore, SnapshotManager};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        Agent, AgentRegistry, AgentRunner, AutoApprove, CallAgentTool, CallbackApproval,
        CheckpointHandler, ConsoleApproval, Decision, EngineConfig, ErrorHandler, ErrorKind,
        ExecutionContext, Message, ModelClient, ModelResponse, ResponseFormat, RetryPolicy,
        RunResults, RunState, StepDefinition, StepName, Tool, ToolRegistry, ToolResult, ToolSpec,
        TypedTool, Workflow, WorkflowEngine, WorkflowError,
    };
}
