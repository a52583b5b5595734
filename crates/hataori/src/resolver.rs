//! Tool input resolution.

use crate::invoke::{revision_prompt, with_system};
use crate::retry::RetryingCaller;
use hataori_core::{
    ContextKey, Message, ModelClient, ModelResponse, RunState, StepDefinition, Tool,
    WorkflowError,
};
use serde_json::{json, Value};
use tracing::debug;

/// Arguments for a tool step, and the model reply they were taken from.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedInput {
    /// The arguments to validate and pass to the tool.
    pub input: Value,
    /// The eliciting reply; `None` for a fixed input.
    pub response: Option<ModelResponse>,
}

/// Decides what a tool step passes to its tool.
///
/// A step with `input_override` uses it verbatim. Otherwise the resolver
/// appends the step prompt (and any pending revision feedback) to the
/// conversation, offers the model only the step's tool and takes the
/// arguments of the first call it proposes. No proposal resolves to `{}`,
/// which the tool's validation then rejects.
#[derive(Clone, Copy)]
pub struct ToolInputResolver<'a> {
    model: &'a dyn ModelClient,
    caller: RetryingCaller<'a>,
    system_prompt: &'a str,
}

impl<'a> ToolInputResolver<'a> {
    /// Creates a resolver calling `model` through `caller`.
    pub fn new(model: &'a dyn ModelClient, caller: RetryingCaller<'a>, system_prompt: &'a str) -> Self {
        Self {
            model,
            caller,
            system_prompt,
        }
    }

    /// Resolves the arguments for `step`.
    ///
    /// Consumes the pending feedback. Fails when the model call fails after
    /// retries or the reply has `finish_reason == Error`.
    pub async fn resolve(
        &self,
        step: &StepDefinition,
        tool: &dyn Tool,
        state: &mut RunState,
        key: impl Into<ContextKey>,
    ) -> Result<ResolvedInput, WorkflowError> {
        let feedback = state.take_feedback();

        if let Some(input) = &step.input_override {
            if feedback.is_some() {
                debug!("Step '{}' has a fixed input, ignoring revision feedback", step.name);
            }
            return Ok(ResolvedInput {
                input: input.clone(),
                response: None,
            });
        }

        let prompt = format!(
            "{}\n\nUse the {} tool to complete this.",
            revision_prompt(&step.prompt, feedback.as_deref()),
            tool.name()
        );
        state.push_message(Message::user(prompt));

        let messages = with_system(self.system_prompt, state.conversation());
        let specs = [tool.spec()];
        let model = self.model;
        let (messages, specs) = (&messages, &specs[..]);
        let response = self
            .caller
            .call(key, "model call", move || model.call(messages, specs, None))
            .await?;

        if response.is_error() {
            return Err(WorkflowError::model(
                response
                    .content
                    .as_deref()
                    .unwrap_or("model reported an error"),
            ));
        }

        let input = match response.tool_calls.first() {
            Some(call) => call.arguments.clone(),
            None => {
                debug!(
                    "Model proposed no '{}' call for step '{}'",
                    tool.name(),
                    step.name
                );
                json!({})
            }
        };

        Ok(ResolvedInput {
            input,
            response: Some(response),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hataori_core::{
        ErrorHandler, ExecutionContext, ResponseFormat, ToolResult, ToolSpec, TypedTool,
    };
    use schemars::JsonSchema;
    use serde::Deserialize;
    use std::sync::Mutex;

    #[derive(Deserialize, JsonSchema)]
    struct QueryInput {
        #[allow(dead_code)]
        query: String,
    }

    struct Search;

    #[async_trait]
    impl TypedTool for Search {
        type Input = QueryInput;
        const NAME: &'static str = "search";
        const DESCRIPTION: &'static str = "Searches";

        async fn run(
            &self,
            _input: QueryInput,
            _ctx: &ExecutionContext,
        ) -> Result<ToolResult, WorkflowError> {
            Ok(ToolResult::ok(json!([])))
        }
    }

    struct OneReply {
        reply: ModelResponse,
        seen: Mutex<Vec<(Vec<Message>, Vec<ToolSpec>)>>,
    }

    impl OneReply {
        fn new(reply: ModelResponse) -> Self {
            Self {
                reply,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ModelClient for OneReply {
        async fn call(
            &self,
            messages: &[Message],
            tools: &[ToolSpec],
            _response_format: Option<ResponseFormat>,
        ) -> Result<ModelResponse, WorkflowError> {
            self.seen
                .lock()
                .unwrap()
                .push((messages.to_vec(), tools.to_vec()));
            Ok(self.reply.clone())
        }
    }

    #[tokio::test]
    async fn test_override_skips_model() {
        let model = OneReply::new(ModelResponse::text("unused"));
        let handler = ErrorHandler::new();
        let resolver = ToolInputResolver::new(&model, RetryingCaller::new(&handler, None), "sys");
        let step = StepDefinition::tool("s", "search", "Find").with_input(json!({"query": "q"}));
        let mut state = RunState::new();
        state.set_feedback(Some("more".to_string()));

        let resolved = resolver.resolve(&step, &Search, &mut state, "k").await.unwrap();

        assert_eq!(resolved.input, json!({"query": "q"}));
        assert!(resolved.response.is_none());
        assert!(model.seen.lock().unwrap().is_empty());
        assert!(state.conversation().is_empty());
        assert_eq!(state.pending_feedback(), None);
    }

    #[tokio::test]
    async fn test_elicits_first_tool_call_with_feedback() {
        let model = OneReply::new(ModelResponse::tool_call("search", json!({"query": "rust"})));
        let handler = ErrorHandler::new();
        let resolver = ToolInputResolver::new(&model, RetryingCaller::new(&handler, None), "sys");
        let step = StepDefinition::tool("s", "search", "Find papers");
        let mut state = RunState::new();
        state.set_feedback(Some("only 2024".to_string()));

        let resolved = resolver.resolve(&step, &Search, &mut state, "k").await.unwrap();
        assert_eq!(resolved.input, json!({"query": "rust"}));

        let seen = model.seen.lock().unwrap();
        let (messages, tools) = &seen[0];
        assert_eq!(messages[0], Message::system("sys"));
        assert_eq!(
            messages[1].content,
            "Find papers\n\nRevision feedback: only 2024\n\nUse the search tool to complete this."
        );
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "search");
        assert_eq!(state.conversation().len(), 1);
    }

    #[tokio::test]
    async fn test_no_tool_call_resolves_to_empty_object() {
        let model = OneReply::new(ModelResponse::text("I'd rather not"));
        let handler = ErrorHandler::new();
        let resolver = ToolInputResolver::new(&model, RetryingCaller::new(&handler, None), "sys");
        let step = StepDefinition::tool("s", "search", "Find");

        let resolved = resolver
            .resolve(&step, &Search, &mut RunState::new(), "k")
            .await
            .unwrap();
        assert_eq!(resolved.input, json!({}));
    }

    #[tokio::test]
    async fn test_error_reply_fails() {
        let model = OneReply::new(ModelResponse::error("overloaded"));
        let handler = ErrorHandler::new();
        let resolver = ToolInputResolver::new(&model, RetryingCaller::new(&handler, None), "sys");
        let step = StepDefinition::tool("s", "search", "Find");

        let error = resolver
            .resolve(&step, &Search, &mut RunState::new(), "k")
            .await
            .unwrap_err();
        assert_eq!(error.to_string(), "Model call failed: overloaded");
        assert_eq!(model.seen.lock().unwrap().len(), 1);
    }
}
