//! Model collaborator interface.
//!
//! Provider clients normalize their wire formats into [`ModelResponse`] and
//! implement [`ModelClient`].

use crate::error::WorkflowError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions framing the conversation.
    System,
    /// Input from the user or the engine on its behalf.
    User,
    /// Output from the model.
    Assistant,
}

/// A role-tagged message in the model's context window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// The author.
    pub role: Role,
    /// The text.
    pub content: String,
}

impl Message {
    /// Creates a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Creates a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Creates an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A tool invocation proposed by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// The tool to invoke.
    pub name: String,
    /// JSON arguments.
    #[serde(default)]
    pub arguments: Value,
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of the answer.
    Stop,
    /// The model wants tools to run.
    ToolUse,
    /// The token budget ran out.
    Length,
    /// The provider reported an error inside an otherwise valid reply.
    Error,
}

/// Token accounting for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens sent.
    pub prompt_tokens: u32,
    /// Tokens generated.
    pub completion_tokens: u32,
}

/// Provider-independent model reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResponse {
    /// Free text, if any.
    #[serde(default)]
    pub content: Option<String>,
    /// Proposed tool invocations, in order.
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    /// Why generation stopped.
    pub finish_reason: FinishReason,
    /// Token accounting.
    #[serde(default)]
    pub usage: Usage,
}

impl ModelResponse {
    /// A plain text answer.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
            finish_reason: FinishReason::Stop,
            usage: Usage::default(),
        }
    }

    /// An answer proposing a single tool call.
    pub fn tool_call(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            content: None,
            tool_calls: vec![ToolCall {
                name: name.into(),
                arguments,
            }],
            finish_reason: FinishReason::ToolUse,
            usage: Usage::default(),
        }
    }

    /// An error reply carrying the provider's message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: Some(message.into()),
            tool_calls: Vec::new(),
            finish_reason: FinishReason::Error,
            usage: Usage::default(),
        }
    }

    /// Returns `true` if the provider flagged the reply as an error.
    pub fn is_error(&self) -> bool {
        self.finish_reason == FinishReason::Error
    }
}

/// Output format requested from the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseFormat {
    /// Free text.
    #[default]
    Text,
    /// A single JSON document.
    Json,
}

/// A tool as offered to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Tool name.
    pub name: String,
    /// What the tool does.
    pub description: String,
    /// JSON schema of the tool's input.
    pub parameters: Value,
}

/// A language model behind some provider.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Sends the conversation and returns the normalized reply.
    ///
    /// `tools` is empty when no tool is offered. Transport failures are
    /// returned as `Err` and may be retried by the caller; a reply with
    /// [`FinishReason::Error`] is not retried.
    async fn call(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
        response_format: Option<ResponseFormat>,
    ) -> Result<ModelResponse, WorkflowError>;
}
