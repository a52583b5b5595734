//! Step descriptors.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Name of a step, unique within its [`Workflow`](crate::Workflow).
///
/// Results, outputs, snapshots and rewind targets are all keyed by it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepName(String);

impl StepName {
    /// Wraps `name`; uniqueness is checked when the workflow is built.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The name as written in the workflow definition.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StepName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for StepName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for StepName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for StepName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for StepName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for StepName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// One unit of work in a workflow.
///
/// A step either invokes a tool (`tool_name` is set) or asks the model for a
/// free-form answer. Checkpointed steps pause the run for a decision after
/// they execute.
///
/// # Examples
///
/// ```
/// use hataori_core::StepDefinition;
/// use serde_json::json;
///
/// let search = StepDefinition::tool("search", "web_search", "Search for the topic")
///     .with_input(json!({"query": "rust async"}))
///     .checkpoint();
/// assert!(search.checkpoint);
/// assert!(!search.is_model_only());
///
/// let outline = StepDefinition::model("outline", "Return JSON: {\"sections\": [...]}");
/// assert!(outline.is_model_only());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDefinition {
    /// Unique name within the workflow.
    pub name: StepName,
    /// Tool to invoke. `None` makes this a model-only step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// Instruction text shown to the model.
    pub prompt: String,
    /// Pause for a checkpoint decision after executing.
    #[serde(default)]
    pub checkpoint: bool,
    /// Fixed tool arguments; bypasses model elicitation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_override: Option<Value>,
}

impl StepDefinition {
    /// Creates a step that invokes `tool_name`.
    pub fn tool(
        name: impl Into<StepName>,
        tool_name: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            tool_name: Some(tool_name.into()),
            prompt: prompt.into(),
            checkpoint: false,
            input_override: None,
        }
    }

    /// Creates a model-only step.
    pub fn model(name: impl Into<StepName>, prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tool_name: None,
            prompt: prompt.into(),
            checkpoint: false,
            input_override: None,
        }
    }

    /// Marks the step as a checkpoint.
    pub fn checkpoint(mut self) -> Self {
        self.checkpoint = true;
        self
    }

    /// Sets fixed tool arguments.
    pub fn with_input(mut self, input: Value) -> Self {
        self.input_override = Some(input);
        self
    }

    /// Returns `true` when the step has no tool.
    pub fn is_model_only(&self) -> bool {
        self.tool_name.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_step_name() {
        let name = StepName::new("test");
        assert_eq!(name.as_str(), "test");

        let name: StepName = "test".into();
        assert_eq!(name, "test");
        assert_eq!(name.to_string(), "test");

        let keyed: std::collections::HashMap<StepName, u32> = [(name, 1)].into();
        assert_eq!(keyed.get("test"), Some(&1));
    }

    #[test]
    fn test_step_definition_serde_defaults() {
        let step: StepDefinition =
            serde_json::from_value(json!({"name": "outline", "prompt": "Write an outline"}))
                .unwrap();
        assert_eq!(step.name, "outline");
        assert!(step.is_model_only());
        assert!(!step.checkpoint);
        assert_eq!(step.input_override, None);
    }

    #[test]
    fn test_step_definition_builder() {
        let step = StepDefinition::tool("fetch", "http_get", "Fetch the page")
            .with_input(json!({"url": "https://example.com"}))
            .checkpoint();
        assert_eq!(step.tool_name.as_deref(), Some("http_get"));
        assert!(step.checkpoint);
        assert_eq!(
            step.input_override,
            Some(json!({"url": "https://example.com"}))
        );
    }
}
