//! The workflow engine.

use crate::checkpoint::AutoApprove;
use crate::config::EngineConfig;
use crate::invoke::{invoke_tool, missing_tool, revision_prompt, with_system};
use crate::registry::ToolRegistry;
use crate::resolver::ToolInputResolver;
use crate::retry::RetryingCaller;
use crate::store::SnapshotManager;
use hataori_core::{
    extract_structured, Attempt, CheckpointHandler, Decision, ErrorHandler, ExecutionContext,
    Message, ModelClient, ModelResponse, ResponseFormat, RunResults, RunState, StateStore,
    StepDefinition, StepName, ToolResult, Workflow, WorkflowError,
};
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Drives a [`Workflow`] step by step, pausing at checkpoints.
///
/// Failed steps never abort a run: every failure becomes a failed
/// [`ToolResult`] and the run continues with the checkpoint or the next
/// step.
///
/// # Examples
///
/// ```no_run
/// use hataori::prelude::*;
/// use std::sync::Arc;
///
/// # async fn demo(model: Arc<dyn ModelClient>, tools: ToolRegistry) -> Result<(), WorkflowError> {
/// let workflow = Workflow::builder("report")
///     .step(StepDefinition::tool("search", "web_search", "Search the topic").checkpoint())
///     .step(StepDefinition::model("outline", "Return JSON: {\"sections\": [...]}"))
///     .build()?;
///
/// let mut engine = WorkflowEngine::builder()
///     .model(model)
///     .tools(tools)
///     .checkpoint(ConsoleApproval::stdio())
///     .build()?;
///
/// let results = engine.run(&workflow).await;
/// for (step, result) in results.iter() {
///     println!("{step}: {}", result.success);
/// }
/// # Ok(())
/// # }
/// ```
pub struct WorkflowEngine {
    model: Arc<dyn ModelClient>,
    tools: ToolRegistry,
    checkpoint: Arc<dyn CheckpointHandler>,
    error_handler: Arc<ErrorHandler>,
    config: EngineConfig,
    store: Option<Arc<dyn StateStore>>,
    context: ExecutionContext,
    state: RunState,
}

impl fmt::Debug for WorkflowEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowEngine")
            .field("tools", &self.tools)
            .field("config", &self.config)
            .field("has_store", &self.store.is_some())
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl WorkflowEngine {
    /// Creates a new engine builder.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// The state of the current or last run.
    pub fn state(&self) -> &RunState {
        &self.state
    }

    /// Consumes the engine, returning the state of the last run.
    pub fn into_state(self) -> RunState {
        self.state
    }

    /// The context handed to tools.
    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    /// Mutable access to the tool context, e.g. to add extensions.
    pub fn context_mut(&mut self) -> &mut ExecutionContext {
        &mut self.context
    }

    /// The engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Discards the run state.
    ///
    /// Retry counters live in the shared [`ErrorHandler`] and are left alone.
    pub fn reset(&mut self) {
        self.state.reset();
    }

    /// Runs `workflow` from its first step with a fresh state.
    ///
    /// Returns the latest result of every executed step, in first-execution
    /// order. Inspect [`state`](Self::state) afterwards for the attempt log
    /// and conversation.
    pub async fn run(&mut self, workflow: &Workflow) -> RunResults {
        self.state = RunState::new();
        info!(
            "Starting workflow '{}' with {} steps (session {})",
            workflow.name(),
            workflow.len(),
            self.config.session_id
        );

        let mut index = 0;
        let mut revising = false;

        while let Some(step) = workflow.step(index) {
            let fresh_visit = !revising;
            revising = false;

            self.state.enter(&step.name, fresh_visit);
            if fresh_visit {
                self.persist_snapshot(&step.name).await;
            }

            let attempt_number = self.state.current_attempt();
            info!("Executing step '{}' (attempt {})", step.name, attempt_number);

            let (result, response) = self.execute_step(step).await;
            if !result.success {
                warn!(
                    "Step '{}' failed: {}",
                    step.name,
                    result.error.as_deref().unwrap_or("unknown error")
                );
            }

            if let Some(payload) = result.payload() {
                let summary = format!("[Step: {}] Result: {}", step.name, payload);
                let message = if step.is_model_only() {
                    Message::assistant(summary)
                } else {
                    Message::user(summary)
                };
                self.state.push_message(message);
            }
            self.state.record_result(&step.name, &result);

            let decision = if step.checkpoint {
                let decision = self.checkpoint.handle(&step.name, &result).await;
                info!("Checkpoint '{}': {}", step.name, decision);
                Some(decision)
            } else {
                None
            };

            self.state.push_attempt(
                Attempt::new(step.name.clone(), attempt_number)
                    .with_response(response)
                    .with_result(result)
                    .with_decision(decision.clone()),
            );
            self.persist_state().await;

            match decision {
                None | Some(Decision::Approve) => {
                    self.state.reset_attempt();
                    index += 1;
                }
                Some(Decision::Stop) => {
                    info!("Workflow '{}' stopped at '{}'", workflow.name(), step.name);
                    break;
                }
                Some(Decision::Revise { feedback }) => {
                    self.state.restore(step.name.as_str());
                    self.state.set_feedback(Some(feedback));
                    self.state.next_attempt();
                    revising = true;
                }
                Some(Decision::Rewind { target }) => match workflow.position(target.as_str()) {
                    Ok(target_index) => {
                        if !self.state.restore(target.as_str()) {
                            debug!("No snapshot for '{}', moving the cursor only", target);
                        }
                        let later = workflow.steps()[target_index + 1..].iter().map(|s| &s.name);
                        let discarded = self.state.discard_snapshots(later);
                        self.forget_persisted_snapshots(&discarded).await;
                        self.state.reset_attempt();
                        self.state.set_feedback(None);
                        index = target_index;
                    }
                    Err(e) => {
                        warn!("Cannot rewind '{}': {}, continuing", workflow.name(), e);
                        self.state.reset_attempt();
                        index += 1;
                    }
                },
            }
        }

        info!(
            "Workflow '{}' finished with {} results",
            workflow.name(),
            self.state.results().len()
        );
        self.state.results().clone()
    }

    fn retry_key(&self, step: &StepName, operation: &str) -> String {
        format!("{}:{}:{}", self.config.session_id, step, operation)
    }

    async fn execute_step(&mut self, step: &StepDefinition) -> (ToolResult, Option<ModelResponse>) {
        match &step.tool_name {
            Some(tool_name) => self.execute_tool_step(step, tool_name).await,
            None => self.execute_model_step(step).await,
        }
    }

    async fn execute_tool_step(
        &mut self,
        step: &StepDefinition,
        tool_name: &str,
    ) -> (ToolResult, Option<ModelResponse>) {
        let Some(tool) = self.tools.get(tool_name) else {
            self.state.take_feedback();
            let input = step.input_override.clone().unwrap_or_else(|| json!({}));
            return (missing_tool(tool_name, input), None);
        };

        let model_key = self.retry_key(&step.name, "model");
        let tool_key = self.retry_key(&step.name, "tool");
        let caller = RetryingCaller::new(&self.error_handler, self.config.call_timeout());
        let resolver =
            ToolInputResolver::new(self.model.as_ref(), caller, &self.config.system_prompt);

        let resolved = match resolver
            .resolve(step, tool.as_ref(), &mut self.state, model_key)
            .await
        {
            Ok(resolved) => resolved,
            Err(e) => {
                let result = ToolResult::failed(e.to_string()).with_origin(tool_name, json!({}));
                return (result, None);
            }
        };
        debug!("Step '{}' resolved input {}", step.name, resolved.input);

        let result =
            invoke_tool(tool.as_ref(), resolved.input, &self.context, &caller, tool_key).await;
        (result, resolved.response)
    }

    async fn execute_model_step(
        &mut self,
        step: &StepDefinition,
    ) -> (ToolResult, Option<ModelResponse>) {
        let feedback = self.state.take_feedback();
        self.state
            .push_message(Message::user(revision_prompt(&step.prompt, feedback.as_deref())));

        let key = self.retry_key(&step.name, "model");
        let messages = with_system(&self.config.system_prompt, self.state.conversation());
        let caller = RetryingCaller::new(&self.error_handler, self.config.call_timeout());
        let model = self.model.as_ref();
        let messages = &messages;

        let outcome = caller
            .call(key, "model call", move || {
                model.call(messages, &[], Some(ResponseFormat::Json))
            })
            .await;

        match outcome {
            Ok(response) if response.is_error() => {
                let message = response
                    .content
                    .as_deref()
                    .unwrap_or("model reported an error");
                let result = ToolResult::failed(WorkflowError::model(message).to_string());
                (result, Some(response))
            }
            Ok(response) => {
                let data = extract_structured(response.content.as_deref().unwrap_or_default());
                (ToolResult::ok(data), Some(response))
            }
            Err(e) => (ToolResult::failed(e.to_string()), None),
        }
    }

    async fn persist_state(&self) {
        let Some(store) = &self.store else {
            return;
        };
        if let Err(e) = store.save(&self.config.session_id, &self.state).await {
            warn!("Failed to save state for '{}': {}", self.config.session_id, e);
        }
    }

    async fn forget_persisted_snapshots(&self, steps: &[StepName]) {
        if !self.config.persist_snapshots || steps.is_empty() {
            return;
        }
        let Some(store) = &self.store else {
            return;
        };
        let snapshots = SnapshotManager::new(Arc::clone(store));
        for step in steps {
            if let Err(e) = snapshots.delete_snapshot(&self.config.session_id, step).await {
                warn!("Failed to delete snapshot for '{}': {}", step, e);
            }
        }
    }

    async fn persist_snapshot(&self, step: &StepName) {
        if !self.config.persist_snapshots {
            return;
        }
        let Some(store) = &self.store else {
            return;
        };
        let snapshots = SnapshotManager::new(Arc::clone(store));
        if let Err(e) = snapshots
            .save_snapshot(&self.config.session_id, step, &self.state)
            .await
        {
            warn!("Failed to save snapshot for '{}': {}", step, e);
        }
    }
}

/// Builder for constructing [`WorkflowEngine`] instances.
#[derive(Default)]
pub struct EngineBuilder {
    model: Option<Arc<dyn ModelClient>>,
    tools: ToolRegistry,
    checkpoint: Option<Arc<dyn CheckpointHandler>>,
    error_handler: Option<Arc<ErrorHandler>>,
    config: EngineConfig,
    store: Option<Arc<dyn StateStore>>,
    context: Option<ExecutionContext>,
}

impl fmt::Debug for EngineBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineBuilder")
            .field("has_model", &self.model.is_some())
            .field("tools", &self.tools)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl EngineBuilder {
    /// Creates a new empty engine builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the model client. Required.
    pub fn model(mut self, model: Arc<dyn ModelClient>) -> Self {
        self.model = Some(model);
        self
    }

    /// Sets the tools steps may invoke.
    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    /// Sets the checkpoint handler; defaults to [`AutoApprove`].
    pub fn checkpoint<H: CheckpointHandler + 'static>(mut self, handler: H) -> Self {
        self.checkpoint = Some(Arc::new(handler));
        self
    }

    /// Sets an already shared checkpoint handler.
    pub fn checkpoint_arc(mut self, handler: Arc<dyn CheckpointHandler>) -> Self {
        self.checkpoint = Some(handler);
        self
    }

    /// Shares an error handler, and its retry counters, with other runs.
    ///
    /// Takes precedence over the retry policies in the configuration.
    pub fn error_handler(mut self, handler: Arc<ErrorHandler>) -> Self {
        self.error_handler = Some(handler);
        self
    }

    /// Sets the configuration.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Persists the run state after every step.
    pub fn state_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the tool context; defaults to one built from the configuration.
    pub fn context(mut self, context: ExecutionContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Builds the engine.
    pub fn build(self) -> Result<WorkflowEngine, WorkflowError> {
        let model = self.model.ok_or_else(|| {
            WorkflowError::Configuration("A model client must be specified".to_string())
        })?;

        let config = self.config;
        config.validate()?;
        let context = self.context.unwrap_or_else(|| {
            let context = ExecutionContext::new(config.session_id.clone());
            match &config.user_id {
                Some(user) => context.with_user(user.clone()),
                None => context,
            }
        });

        Ok(WorkflowEngine {
            model,
            tools: self.tools,
            checkpoint: self.checkpoint.unwrap_or_else(|| Arc::new(AutoApprove)),
            error_handler: self
                .error_handler
                .unwrap_or_else(|| Arc::new(config.error_handler())),
            config,
            store: self.store,
            context,
            state: RunState::new(),
        })
    }
}
