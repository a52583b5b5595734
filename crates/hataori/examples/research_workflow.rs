//! Research workflow: search, outline, write and render a report.
//!
//! Runs against a canned model so no API key is needed. Pass `--interactive`
//! to review each checkpoint on the console instead of approving it.

use async_trait::async_trait;
use hataori::prelude::*;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

/// Answers from the shape of the request instead of calling a real model.
struct CannedModel;

#[async_trait]
impl ModelClient for CannedModel {
    async fn call(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
        _format: Option<ResponseFormat>,
    ) -> Result<ModelResponse, WorkflowError> {
        if let Some(tool) = tools.first() {
            return Ok(ModelResponse::tool_call(
                tool.name.clone(),
                json!({"title": "Rust async runtimes"}),
            ));
        }

        let prompt = messages.last().map(|m| m.content.as_str()).unwrap_or_default();
        let reply = if prompt.contains("outline") {
            "```json\n{\"sections\": [\"Background\", \"Executors\", \"Comparison\"]}\n```"
        } else {
            r#"{"content": "Tokio dominates; smol and glommio target narrower niches."}"#
        };
        Ok(ModelResponse::text(reply))
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct SearchInput {
    query: String,
}

#[derive(Debug)]
struct WebSearch;

#[async_trait]
impl TypedTool for WebSearch {
    type Input = SearchInput;
    const NAME: &'static str = "web_search";
    const DESCRIPTION: &'static str = "Searches the web for a query";

    async fn run(
        &self,
        input: SearchInput,
        _ctx: &ExecutionContext,
    ) -> Result<ToolResult, WorkflowError> {
        println!("Searching for '{}'...", input.query);
        Ok(ToolResult::ok(json!({
            "query": input.query,
            "results": ["tokio.rs", "smol-rs on GitHub", "glommio docs"],
        })))
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
struct PdfInput {
    title: String,
}

#[derive(Debug)]
struct PdfCreator;

#[async_trait]
impl TypedTool for PdfCreator {
    type Input = PdfInput;
    const NAME: &'static str = "pdf_creator";
    const DESCRIPTION: &'static str = "Renders the report as a PDF";

    async fn run(
        &self,
        input: PdfInput,
        ctx: &ExecutionContext,
    ) -> Result<ToolResult, WorkflowError> {
        let path = format!("/tmp/{}-{}.pdf", ctx.session_id(), input.title.replace(' ', "_"));
        Ok(ToolResult::ok(json!({ "path": path })))
    }
}

#[tokio::main]
async fn main() -> Result<(), WorkflowError> {
    tracing_subscriber::fmt::init();

    let workflow = Workflow::builder("research")
        .description("Research a topic and publish a PDF report")
        .step(
            StepDefinition::tool("search", "web_search", "Search for the topic")
                .with_input(json!({"query": "rust async runtimes"}))
                .checkpoint(),
        )
        .step(
            StepDefinition::model(
                "create_outline",
                "Create an outline from the search results. Return JSON: {\"sections\": [...]}",
            )
            .checkpoint(),
        )
        .step(
            StepDefinition::model(
                "write_content",
                "Write the report following the approved sections. Return JSON: {\"content\": \"...\"}",
            )
            .checkpoint(),
        )
        .step(StepDefinition::tool(
            "create_pdf",
            "pdf_creator",
            "Render the report as a PDF",
        ))
        .build()?;

    let tools = ToolRegistry::new().with(WebSearch).with(PdfCreator);
    let builder = WorkflowEngine::builder()
        .model(Arc::new(CannedModel))
        .tools(tools)
        .config(EngineConfig::default().with_system_prompt("You are a research assistant."));

    let builder = if std::env::args().any(|arg| arg == "--interactive") {
        builder.checkpoint(ConsoleApproval::stdio())
    } else {
        builder.checkpoint(AutoApprove)
    };
    let mut engine = builder.build()?;

    let results = engine.run(&workflow).await;

    for (step, result) in results.iter() {
        match (&result.data, &result.error) {
            (Some(data), _) => println!("{step}: {data}"),
            (None, Some(error)) => eprintln!("{step} failed: {error}"),
            (None, None) => println!("{step}: (no output)"),
        }
    }
    println!("Attempts recorded: {}", engine.state().attempts().len());

    Ok(())
}
