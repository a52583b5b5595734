//! Caller-owned tool and agent registries.

use crate::agent::Agent;
use hataori_core::{Tool, ToolSpec};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Tools available to a run, keyed by name.
///
/// Registering a tool under an existing name replaces it.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ToolRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a tool.
    pub fn register<T: Tool + 'static>(&mut self, tool: T) -> &mut Self {
        self.register_arc(Arc::new(tool))
    }

    /// Adds an already shared tool.
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) -> &mut Self {
        self.tools.insert(tool.name().to_string(), tool);
        self
    }

    /// Adds several shared tools.
    pub fn register_many(&mut self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> &mut Self {
        for tool in tools {
            self.register_arc(tool);
        }
        self
    }

    /// Builder-style [`register`](Self::register).
    pub fn with<T: Tool + 'static>(mut self, tool: T) -> Self {
        self.register(tool);
        self
    }

    /// Returns the tool called `name`.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Returns `true` if a tool called `name` is registered.
    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Removes and returns the tool called `name`.
    pub fn remove(&mut self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.remove(name)
    }

    /// Removes every tool.
    pub fn clear(&mut self) {
        self.tools.clear();
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Specs of every tool, as offered to the model.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools.values().map(|tool| tool.spec()).collect()
    }

    /// Returns the number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns `true` if no tool is registered.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Agents available for delegation, keyed by name.
#[derive(Clone, Default)]
pub struct AgentRegistry {
    agents: BTreeMap<String, Arc<Agent>>,
}

impl fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentRegistry")
            .field("agents", &self.agents.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl AgentRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an agent, replacing one with the same name.
    pub fn register(&mut self, agent: Agent) -> &mut Self {
        self.agents.insert(agent.name().to_string(), Arc::new(agent));
        self
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, agent: Agent) -> Self {
        self.register(agent);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<Agent>> {
        self.agents.get(name).cloned()
    }

    pub fn has(&self, name: &str) -> bool {
        self.agents.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Arc<Agent>> {
        self.agents.remove(name)
    }

    pub fn clear(&mut self) {
        self.agents.clear();
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.agents.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hataori_core::{ExecutionContext, ToolResult, WorkflowError};
    use serde_json::{json, Value};

    struct Named(&'static str);

    #[async_trait]
    impl Tool for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            "test tool"
        }

        fn input_schema(&self) -> Value {
            json!({"type": "object"})
        }

        fn validate(&self, _input: &Value) -> Result<(), String> {
            Ok(())
        }

        async fn execute(
            &self,
            _input: Value,
            _ctx: &ExecutionContext,
        ) -> Result<ToolResult, WorkflowError> {
            Ok(ToolResult::ok(json!(self.0)))
        }
    }

    #[test]
    fn test_register_and_lookup() {
        let mut registry = ToolRegistry::new();
        registry.register(Named("search")).register(Named("clock"));

        assert!(registry.has("search"));
        assert_eq!(registry.names(), vec!["clock", "search"]);
        assert_eq!(registry.get("clock").unwrap().name(), "clock");
        assert!(registry.get("pdf").is_none());
    }

    #[test]
    fn test_register_many_and_remove() {
        let mut registry = ToolRegistry::new();
        let tools: Vec<Arc<dyn Tool>> = vec![Arc::new(Named("a")), Arc::new(Named("b"))];
        registry.register_many(tools);
        assert_eq!(registry.len(), 2);

        assert!(registry.remove("a").is_some());
        assert!(!registry.has("a"));

        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_specs() {
        let registry = ToolRegistry::new().with(Named("search"));
        let specs = registry.specs();
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].name, "search");
        assert_eq!(specs[0].parameters, json!({"type": "object"}));
    }

    struct Silent;

    #[async_trait]
    impl hataori_core::ModelClient for Silent {
        async fn call(
            &self,
            _messages: &[hataori_core::Message],
            _tools: &[ToolSpec],
            _format: Option<hataori_core::ResponseFormat>,
        ) -> Result<hataori_core::ModelResponse, WorkflowError> {
            Ok(hataori_core::ModelResponse::text("ok"))
        }
    }

    #[test]
    fn test_agent_registry() {
        let model: Arc<dyn hataori_core::ModelClient> = Arc::new(Silent);
        let mut registry = AgentRegistry::new()
            .with(Agent::new("writer", model.clone()))
            .with(Agent::new("researcher", model.clone()));

        assert_eq!(registry.names(), vec!["researcher", "writer"]);
        assert!(registry.has("writer"));
        assert_eq!(registry.get("writer").unwrap().name(), "writer");

        registry.register(Agent::new("writer", model).with_system_prompt("Be brief."));
        assert_eq!(registry.len(), 2);

        assert!(registry.remove("writer").is_some());
        assert!(registry.get("writer").is_none());
        registry.clear();
        assert!(registry.is_empty());
    }
}
