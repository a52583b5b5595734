//! Tool collaborator interface and step results.

use crate::context::ExecutionContext;
use crate::error::WorkflowError;
use crate::model::ToolSpec;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Outcome of one step or tool execution.
///
/// Failures are data: the engine turns every error it catches into a
/// `ToolResult` with `success == false` and keeps going.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the call succeeded.
    pub success: bool,
    /// The tool that produced the result; `None` for model-only steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// Arguments the tool was called with.
    #[serde(default)]
    pub input: Value,
    /// Payload on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Human-readable failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Free-form execution details (timings, token counts).
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl ToolResult {
    /// A successful result carrying `data`.
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            tool_name: None,
            input: Value::Null,
            data: Some(data),
            error: None,
            metadata: Map::new(),
        }
    }

    /// A failed result.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            tool_name: None,
            input: Value::Null,
            data: None,
            error: Some(error.into()),
            metadata: Map::new(),
        }
    }

    /// Records which tool produced the result and with what input.
    pub fn with_origin(mut self, tool_name: impl Into<String>, input: Value) -> Self {
        self.tool_name = Some(tool_name.into());
        self.input = input;
        self
    }

    /// Adds a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Returns the payload when the result succeeded and carries something.
    pub fn payload(&self) -> Option<&Value> {
        if !self.success {
            return None;
        }
        self.data.as_ref().filter(|data| !is_empty_value(data))
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// An external capability a step can invoke.
///
/// Most tools implement [`TypedTool`] instead and get this trait for free.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name.
    fn name(&self) -> &str;

    /// What the tool does, as shown to the model.
    fn description(&self) -> &str;

    /// JSON schema of the accepted input.
    fn input_schema(&self) -> Value;

    /// Checks `input` against the declared input shape.
    fn validate(&self, input: &Value) -> Result<(), String>;

    /// Runs the tool on validated input.
    async fn execute(
        &self,
        input: Value,
        ctx: &ExecutionContext,
    ) -> Result<ToolResult, WorkflowError>;

    /// The tool as offered to the model.
    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.input_schema(),
        }
    }
}

/// A tool whose input shape is a Rust type.
///
/// Validation is deserialization into [`Input`](TypedTool::Input) and the
/// schema offered to the model is generated from it.
///
/// # Examples
///
/// ```
/// use hataori_core::{ExecutionContext, Tool, ToolResult, TypedTool, WorkflowError};
/// use async_trait::async_trait;
/// use schemars::JsonSchema;
/// use serde::Deserialize;
/// use serde_json::json;
///
/// #[derive(Deserialize, JsonSchema)]
/// struct EchoInput {
///     text: String,
/// }
///
/// struct Echo;
///
/// #[async_trait]
/// impl TypedTool for Echo {
///     type Input = EchoInput;
///     const NAME: &'static str = "echo";
///     const DESCRIPTION: &'static str = "Repeats the text";
///
///     async fn run(
///         &self,
///         input: EchoInput,
///         _ctx: &ExecutionContext,
///     ) -> Result<ToolResult, WorkflowError> {
///         Ok(ToolResult::ok(json!({"text": input.text})))
///     }
/// }
///
/// assert!(Echo.validate(&json!({"text": "hi"})).is_ok());
/// assert!(Echo.validate(&json!({})).is_err());
/// ```
#[async_trait]
pub trait TypedTool: Send + Sync {
    /// Declared input shape.
    type Input: DeserializeOwned + JsonSchema + Send;

    /// Unique tool name.
    const NAME: &'static str;

    /// What the tool does, as shown to the model.
    const DESCRIPTION: &'static str;

    /// Runs the tool.
    async fn run(
        &self,
        input: Self::Input,
        ctx: &ExecutionContext,
    ) -> Result<ToolResult, WorkflowError>;
}

#[async_trait]
impl<T> Tool for T
where
    T: TypedTool,
{
    fn name(&self) -> &str {
        T::NAME
    }

    fn description(&self) -> &str {
        T::DESCRIPTION
    }

    fn input_schema(&self) -> Value {
        serde_json::to_value(schemars::schema_for!(T::Input)).unwrap_or_default()
    }

    fn validate(&self, input: &Value) -> Result<(), String> {
        <T::Input as Deserialize>::deserialize(input)
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    async fn execute(
        &self,
        input: Value,
        ctx: &ExecutionContext,
    ) -> Result<ToolResult, WorkflowError> {
        let input: T::Input =
            serde_json::from_value(input).map_err(|e| WorkflowError::InvalidInput {
                tool_name: T::NAME.to_string(),
                details: e.to_string(),
            })?;
        self.run(input, ctx).await
    }
}
