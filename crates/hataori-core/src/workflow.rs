//! Workflow definitions.

use crate::error::WorkflowError;
use crate::step::{StepDefinition, StepName};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// An ordered, immutable sequence of steps.
///
/// Step names are unique; both the builder and deserialization reject
/// duplicates.
///
/// # Examples
///
/// ```
/// use hataori_core::{StepDefinition, Workflow};
///
/// let workflow = Workflow::builder("report")
///     .description("Research a topic and write it up")
///     .step(StepDefinition::tool("search", "web_search", "Search the topic"))
///     .step(StepDefinition::model("summary", "Summarize the findings").checkpoint())
///     .build()
///     .unwrap();
///
/// assert_eq!(workflow.len(), 2);
/// assert_eq!(workflow.index_of("summary"), Some(1));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawWorkflow")]
pub struct Workflow {
    name: String,
    description: String,
    steps: Vec<StepDefinition>,
}

#[derive(Deserialize)]
struct RawWorkflow {
    name: String,
    #[serde(default)]
    description: String,
    steps: Vec<StepDefinition>,
}

impl TryFrom<RawWorkflow> for Workflow {
    type Error = WorkflowError;

    fn try_from(raw: RawWorkflow) -> Result<Self, Self::Error> {
        Workflow::new(raw.name, raw.description, raw.steps)
    }
}

impl Workflow {
    /// Creates a workflow, rejecting duplicate step names.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        steps: Vec<StepDefinition>,
    ) -> Result<Self, WorkflowError> {
        let mut seen = HashSet::new();
        for step in &steps {
            if !seen.insert(step.name.as_str()) {
                return Err(WorkflowError::Configuration(format!(
                    "Duplicate step name '{}'",
                    step.name
                )));
            }
        }

        Ok(Self {
            name: name.into(),
            description: description.into(),
            steps,
        })
    }

    /// Creates a new workflow builder.
    pub fn builder(name: impl Into<String>) -> WorkflowBuilder {
        WorkflowBuilder::new(name)
    }

    /// Parses a workflow from JSON, preserving step order.
    pub fn from_json(json: &str) -> Result<Self, WorkflowError> {
        // Duplicate names surface as Configuration, not Serialization.
        let raw: RawWorkflow = serde_json::from_str(json)?;
        Self::try_from(raw)
    }

    /// Returns the workflow name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the steps in execution order.
    pub fn steps(&self) -> &[StepDefinition] {
        &self.steps
    }

    /// Returns the step at `index`.
    pub fn step(&self, index: usize) -> Option<&StepDefinition> {
        self.steps.get(index)
    }

    /// Returns the position of the step called `name`.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.steps.iter().position(|step| step.name == name)
    }

    /// Like [`index_of`](Self::index_of), failing with
    /// [`WorkflowError::StepNotFound`] for unknown names.
    pub fn position(&self, name: &str) -> Result<usize, WorkflowError> {
        self.index_of(name)
            .ok_or_else(|| WorkflowError::StepNotFound(StepName::new(name)))
    }

    /// Returns an iterator over step names in order.
    pub fn step_names(&self) -> impl Iterator<Item = &StepName> {
        self.steps.iter().map(|step| &step.name)
    }

    /// Returns the number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns `true` if the workflow has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Builder for constructing [`Workflow`] instances.
#[derive(Debug, Default)]
pub struct WorkflowBuilder {
    name: String,
    description: String,
    steps: Vec<StepDefinition>,
}

impl WorkflowBuilder {
    /// Creates a new empty workflow builder.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            steps: Vec::new(),
        }
    }

    /// Sets the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Appends a step.
    pub fn step(mut self, step: StepDefinition) -> Self {
        self.steps.push(step);
        self
    }

    /// Appends several steps.
    pub fn steps(mut self, steps: impl IntoIterator<Item = StepDefinition>) -> Self {
        self.steps.extend(steps);
        self
    }

    /// Builds the workflow.
    pub fn build(self) -> Result<Workflow, WorkflowError> {
        Workflow::new(self.name, self.description, self.steps)
    }
}
