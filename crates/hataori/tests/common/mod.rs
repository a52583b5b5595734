//! Scripted collaborators shared by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use hataori::prelude::*;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Reply used once the script runs out.
pub const DEFAULT_REPLY: &str = r#"{"done": true}"#;

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub messages: Vec<Message>,
    pub tools: Vec<String>,
    pub format: Option<ResponseFormat>,
}

/// Model double answering from a queue and recording every call.
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<ModelResponse, WorkflowError>>>,
    calls: Mutex<Vec<RecordedCall>>,
    delay: Option<Duration>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, response: ModelResponse) -> Self {
        self.replies.lock().unwrap().push_back(Ok(response));
        self
    }

    pub fn text(self, content: &str) -> Self {
        self.reply(ModelResponse::text(content))
    }

    pub fn fail(self, error: WorkflowError) -> Self {
        self.replies.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn call(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
        response_format: Option<ResponseFormat>,
    ) -> Result<ModelResponse, WorkflowError> {
        self.calls.lock().unwrap().push(RecordedCall {
            messages: messages.to_vec(),
            tools: tools.iter().map(|t| t.name.clone()).collect(),
            format: response_format,
        });

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.replies.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(ModelResponse::text(DEFAULT_REPLY)))
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchInput {
    pub query: String,
}

/// Tool double counting its executions.
#[derive(Clone, Default)]
pub struct SearchTool {
    calls: Arc<AtomicUsize>,
}

impl SearchTool {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TypedTool for SearchTool {
    type Input = SearchInput;
    const NAME: &'static str = "web_search";
    const DESCRIPTION: &'static str = "Searches the web";

    async fn run(
        &self,
        input: SearchInput,
        _ctx: &ExecutionContext,
    ) -> Result<ToolResult, WorkflowError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ToolResult::ok(json!({"query": input.query, "hits": 3})))
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct PdfInput {
    pub title: String,
}

/// Tool double failing a fixed number of times before succeeding.
#[derive(Clone, Default)]
pub struct FlakyPdfTool {
    failures_left: Arc<AtomicUsize>,
    calls: Arc<AtomicUsize>,
}

impl FlakyPdfTool {
    pub fn failing(times: usize) -> Self {
        Self {
            failures_left: Arc::new(AtomicUsize::new(times)),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TypedTool for FlakyPdfTool {
    type Input = PdfInput;
    const NAME: &'static str = "pdf_creator";
    const DESCRIPTION: &'static str = "Renders a PDF";

    async fn run(
        &self,
        input: PdfInput,
        _ctx: &ExecutionContext,
    ) -> Result<ToolResult, WorkflowError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(WorkflowError::tool("pdf_creator", "renderer crashed"));
        }
        Ok(ToolResult::ok(json!({"path": format!("/tmp/{}.pdf", input.title)})))
    }
}

/// Checkpoint double replaying decisions, then approving.
#[derive(Clone, Default)]
pub struct ScriptedCheckpoint {
    decisions: Arc<Mutex<VecDeque<Decision>>>,
    seen: Arc<Mutex<Vec<(String, bool)>>>,
}

impl ScriptedCheckpoint {
    pub fn new(decisions: impl IntoIterator<Item = Decision>) -> Self {
        Self {
            decisions: Arc::new(Mutex::new(decisions.into_iter().collect())),
            seen: Arc::default(),
        }
    }

    /// Step names handled so far, in order.
    pub fn steps(&self) -> Vec<String> {
        self.seen
            .lock()
            .unwrap()
            .iter()
            .map(|(step, _)| step.clone())
            .collect()
    }

    /// Success flags of the results handled so far.
    pub fn outcomes(&self) -> Vec<bool> {
        self.seen.lock().unwrap().iter().map(|(_, ok)| *ok).collect()
    }
}

#[async_trait]
impl CheckpointHandler for ScriptedCheckpoint {
    async fn handle(&self, step_name: &StepName, result: &ToolResult) -> Decision {
        self.seen
            .lock()
            .unwrap()
            .push((step_name.to_string(), result.success));
        self.decisions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Decision::Approve)
    }
}

pub fn engine(
    model: Arc<ScriptedModel>,
    tools: ToolRegistry,
    checkpoint: ScriptedCheckpoint,
) -> WorkflowEngine {
    WorkflowEngine::builder()
        .model(model)
        .tools(tools)
        .checkpoint(checkpoint)
        .config(EngineConfig::default().with_session_id("test-session"))
        .build()
        .unwrap()
}

pub fn attempt_log(state: &RunState) -> Vec<(String, u32)> {
    state
        .attempts()
        .iter()
        .map(|a| (a.step.to_string(), a.attempt_number))
        .collect()
}
