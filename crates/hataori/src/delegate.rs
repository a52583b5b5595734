//! Delegating a task to another registered agent.

use crate::registry::AgentRegistry;
use async_trait::async_trait;
use hataori_core::{ExecutionContext, ToolResult, TypedTool, WorkflowError};
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

/// Input of [`CallAgentTool`].
#[derive(Debug, Deserialize, JsonSchema)]
pub struct CallAgentInput {
    /// Name of the agent to hand the task to.
    pub agent_name: String,
    /// The task, in plain language.
    pub task: String,
}

/// Tool that runs a task on another agent and returns its answer.
///
/// An unknown agent name or a failed agent run yields a failed result, so
/// the calling model can pick another agent or give up.
#[derive(Debug, Clone, Default)]
pub struct CallAgentTool {
    agents: AgentRegistry,
}

impl CallAgentTool {
    /// Creates the tool over `agents`.
    pub fn new(agents: AgentRegistry) -> Self {
        Self { agents }
    }
}

#[async_trait]
impl TypedTool for CallAgentTool {
    type Input = CallAgentInput;
    const NAME: &'static str = "call_agent";
    const DESCRIPTION: &'static str = "Delegates a task to another specialized agent";

    async fn run(
        &self,
        input: CallAgentInput,
        ctx: &ExecutionContext,
    ) -> Result<ToolResult, WorkflowError> {
        let Some(agent) = self.agents.get(&input.agent_name) else {
            return Ok(ToolResult::failed(format!(
                "Agent '{}' not found. Available: {:?}",
                input.agent_name,
                self.agents.names()
            )));
        };

        debug!("Delegating to agent '{}': {}", input.agent_name, input.task);
        let mut runner = agent.runner(ctx);
        match runner.run(&input.task).await {
            Ok(answer) => Ok(ToolResult::ok(json!({
                "agent": input.agent_name,
                "result": answer,
            }))),
            Err(e) => {
                warn!("Agent '{}' failed: {}", input.agent_name, e);
                Ok(ToolResult::failed(format!(
                    "Agent '{}' failed: {e}",
                    input.agent_name
                )))
            }
        }
    }
}
