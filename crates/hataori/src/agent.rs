//! Free tool-using agent loop.

use crate::config::EngineConfig;
use crate::invoke::{invoke_tool, missing_tool, with_system};
use crate::registry::ToolRegistry;
use crate::retry::RetryingCaller;
use hataori_core::{
    Attempt, ErrorHandler, ExecutionContext, Message, ModelClient, RunState, ToolResult,
    WorkflowError,
};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Lets the model call tools until it answers in plain text.
///
/// Each turn offers every registered tool. Proposed calls are executed in
/// order and their results are fed back as user messages; a turn without
/// tool calls ends the loop with the model's text.
pub struct AgentRunner {
    model: Arc<dyn ModelClient>,
    tools: ToolRegistry,
    error_handler: Arc<ErrorHandler>,
    config: EngineConfig,
    context: ExecutionContext,
    state: RunState,
}

impl fmt::Debug for AgentRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentRunner")
            .field("tools", &self.tools)
            .field("config", &self.config)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl AgentRunner {
    /// Creates a runner with the default configuration.
    pub fn new(model: Arc<dyn ModelClient>, tools: ToolRegistry) -> Self {
        let config = EngineConfig::default();
        Self {
            model,
            tools,
            error_handler: Arc::new(ErrorHandler::new()),
            context: ExecutionContext::new(config.session_id.clone()),
            config,
            state: RunState::new(),
        }
    }

    /// Sets the configuration and rebuilds the tool context and the error
    /// handler from it.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.error_handler = Arc::new(config.error_handler());
        let context = ExecutionContext::new(config.session_id.clone());
        self.context = match &config.user_id {
            Some(user) => context.with_user(user.clone()),
            None => context,
        };
        self.config = config;
        self
    }

    /// Shares an error handler with other runs.
    pub fn with_error_handler(mut self, handler: Arc<ErrorHandler>) -> Self {
        self.error_handler = handler;
        self
    }

    /// Sets the tool context.
    pub fn with_context(mut self, context: ExecutionContext) -> Self {
        self.context = context;
        self
    }

    /// Conversation and attempt log so far.
    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Discards the conversation and attempt log.
    pub fn reset(&mut self) {
        self.state.reset();
    }

    /// Works on `task` and returns the model's final answer.
    ///
    /// The conversation carries over between calls until [`reset`](Self::reset).
    pub async fn run(&mut self, task: &str) -> Result<String, WorkflowError> {
        self.state.push_message(Message::user(task));
        let specs = self.tools.specs();
        let caller = RetryingCaller::new(&self.error_handler, self.config.call_timeout());
        let model_key = format!("{}:agent:model", self.config.session_id);
        let tool_key = format!("{}:agent:tool", self.config.session_id);

        for iteration in 0..self.config.max_iterations {
            let messages = with_system(&self.config.system_prompt, self.state.conversation());
            let model = self.model.as_ref();
            let (messages, specs) = (&messages, &specs[..]);
            let response = caller
                .call(model_key.as_str(), "model call", move || {
                    model.call(messages, specs, None)
                })
                .await?;

            if response.is_error() {
                return Err(WorkflowError::model(
                    response.content.unwrap_or_else(|| "Unknown error".to_string()),
                ));
            }

            let step = format!("iteration_{iteration}");
            let attempt_number = iteration + 1;

            if response.tool_calls.is_empty() {
                let answer = response.content.clone().unwrap_or_default();
                if !answer.is_empty() {
                    self.state.push_message(Message::assistant(answer.clone()));
                }
                let attempt = Attempt::new(step, attempt_number).with_response(Some(response));
                self.state.push_attempt(attempt);
                info!("Agent finished after {} iterations", attempt_number);
                return Ok(answer);
            }

            let mut attempt = Attempt::new(step, attempt_number);
            for call in &response.tool_calls {
                debug!("Agent calls '{}' with {}", call.name, call.arguments);
                let result = match self.tools.get(&call.name) {
                    Some(tool) => {
                        invoke_tool(
                            tool.as_ref(),
                            call.arguments.clone(),
                            &self.context,
                            &caller,
                            tool_key.as_str(),
                        )
                        .await
                    }
                    None => missing_tool(&call.name, call.arguments.clone()),
                };
                self.state
                    .push_message(Message::user(tool_feedback(&call.name, &result)));
                attempt = attempt.with_result(result);
            }
            self.state.push_attempt(attempt.with_response(Some(response)));
        }

        Err(WorkflowError::IterationLimit {
            limit: self.config.max_iterations,
        })
    }
}

/// A named, reusable agent definition.
///
/// Each [`runner`](Self::runner) call starts a fresh conversation, so one
/// definition can serve many delegated tasks.
#[derive(Clone)]
pub struct Agent {
    name: String,
    model: Arc<dyn ModelClient>,
    tools: ToolRegistry,
    config: EngineConfig,
}

impl fmt::Debug for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("tools", &self.tools)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Agent {
    /// Creates an agent without tools and with the default configuration.
    pub fn new(name: impl Into<String>, model: Arc<dyn ModelClient>) -> Self {
        Self {
            name: name.into(),
            model,
            tools: ToolRegistry::new(),
            config: EngineConfig::default(),
        }
    }

    /// Sets the tools the agent may call.
    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    /// Sets the configuration. The session and user come from the caller's
    /// context at run time.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = prompt.into();
        self
    }

    /// The agent's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The agent's tools.
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// A runner for one task on behalf of `ctx`.
    ///
    /// The runner's session is `<caller session>:<agent name>`, keeping its
    /// retry budgets apart from the caller's.
    pub fn runner(&self, ctx: &ExecutionContext) -> AgentRunner {
        let mut config = self
            .config
            .clone()
            .with_session_id(format!("{}:{}", ctx.session_id(), self.name));
        config.user_id = ctx.user_id().map(str::to_string);
        AgentRunner::new(Arc::clone(&self.model), self.tools.clone()).with_config(config)
    }
}

fn tool_feedback(tool_name: &str, result: &ToolResult) -> String {
    if result.success {
        let data = result.data.clone().unwrap_or_default();
        format!("[Tool: {tool_name}] Result: {data}")
    } else {
        format!(
            "[Tool: {tool_name}] Error: {}",
            result.error.as_deref().unwrap_or("unknown error")
        )
    }
}
