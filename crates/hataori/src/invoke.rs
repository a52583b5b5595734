//! Message assembly and tool invocation shared by the engine and the agent
//! loop.

use crate::retry::RetryingCaller;
use hataori_core::{ContextKey, ExecutionContext, Message, Tool, ToolResult, WorkflowError};
use serde_json::Value;
use tracing::debug;

/// The system prompt followed by the conversation.
pub(crate) fn with_system(system_prompt: &str, conversation: &[Message]) -> Vec<Message> {
    let mut messages = Vec::with_capacity(conversation.len() + 1);
    messages.push(Message::system(system_prompt));
    messages.extend_from_slice(conversation);
    messages
}

/// A step prompt with revision feedback appended, if any.
pub(crate) fn revision_prompt(prompt: &str, feedback: Option<&str>) -> String {
    match feedback {
        Some(feedback) => format!("{prompt}\n\nRevision feedback: {feedback}"),
        None => prompt.to_string(),
    }
}

/// Failed result for a tool name nothing is registered under.
pub(crate) fn missing_tool(tool_name: &str, input: Value) -> ToolResult {
    ToolResult::failed(WorkflowError::ToolNotFound(tool_name.to_string()).to_string())
        .with_origin(tool_name, input)
}

/// Validates `input` and executes `tool` with retries.
///
/// Never fails: validation and execution errors come back as failed results
/// carrying the tool name and the raw input.
pub(crate) async fn invoke_tool(
    tool: &dyn Tool,
    input: Value,
    ctx: &ExecutionContext,
    caller: &RetryingCaller<'_>,
    key: impl Into<ContextKey>,
) -> ToolResult {
    let name = tool.name().to_string();

    if let Err(details) = tool.validate(&input) {
        debug!("Tool '{}' rejected input {}: {}", name, input, details);
        return ToolResult::failed(format!("Invalid input: {details}")).with_origin(name, input);
    }

    let args = &input;
    match caller
        .call(key, "tool call", move || tool.execute(args.clone(), ctx))
        .await
    {
        Ok(result) => result.with_origin(name, input),
        Err(e) => ToolResult::failed(format!("Execution error: {e}")).with_origin(name, input),
    }
}
