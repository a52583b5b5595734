//! Run state: cursor, attempt log, conversation and rewind snapshots.
//!
//! The restorable part of the state is a [`RunFrame`] held behind an `Arc`.
//! A snapshot is just another handle to a frame, so taking one and restoring
//! it are both `Arc` clones; writes go through `Arc::make_mut` and copy the
//! frame only while a snapshot still shares it.

use crate::checkpoint::Decision;
use crate::model::{Message, ModelResponse};
use crate::step::StepName;
use crate::tool::ToolResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Step results in first-execution order.
///
/// Re-running a step replaces its result in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunResults {
    entries: Vec<(StepName, ToolResult)>,
}

impl RunResults {
    /// Creates an empty result set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the result for `step`, keeping its original position.
    pub fn insert(&mut self, step: StepName, result: ToolResult) {
        match self.entries.iter_mut().find(|(name, _)| *name == step) {
            Some((_, existing)) => *existing = result,
            None => self.entries.push((step, result)),
        }
    }

    /// Returns the result for `step`.
    pub fn get(&self, step: &str) -> Option<&ToolResult> {
        self.entries
            .iter()
            .find(|(name, _)| name.as_str() == step)
            .map(|(_, result)| result)
    }

    /// Returns `true` if `step` has a result.
    pub fn contains(&self, step: &str) -> bool {
        self.get(step).is_some()
    }

    /// Iterates over step names in order.
    pub fn step_names(&self) -> impl Iterator<Item = &StepName> {
        self.entries.iter().map(|(name, _)| name)
    }

    /// Iterates over `(step, result)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&StepName, &ToolResult)> {
        self.entries.iter().map(|(name, result)| (name, result))
    }

    /// Returns the number of steps with a result.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no step has a result.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for RunResults {
    type Item = (StepName, ToolResult);
    type IntoIter = std::vec::IntoIter<(StepName, ToolResult)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// The part of the run state restored on revise and rewind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunFrame {
    /// Latest successful payload per step.
    pub outputs: HashMap<StepName, Value>,
    /// The model's context window, without the system prompt.
    pub conversation: Vec<Message>,
    /// Latest result per step.
    pub results: RunResults,
}

/// Log entry for one execution of one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    /// The step, or `iteration_<n>` (n from 0) for agent loop turns.
    pub step: StepName,
    /// 1-based; grows only on revise.
    pub attempt_number: u32,
    /// When the attempt was recorded.
    pub timestamp: DateTime<Utc>,
    /// The model reply, when the attempt called the model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_response: Option<ModelResponse>,
    /// Results produced by the attempt.
    #[serde(default)]
    pub tool_results: Vec<ToolResult>,
    /// The checkpoint decision, for checkpointed steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,
    /// Failure text, if the attempt failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Attempt {
    /// Starts a record stamped with the current time.
    pub fn new(step: impl Into<StepName>, attempt_number: u32) -> Self {
        Self {
            step: step.into(),
            attempt_number,
            timestamp: Utc::now(),
            model_response: None,
            tool_results: Vec::new(),
            decision: None,
            error: None,
        }
    }

    /// Adds a result; a failed result also sets `error`.
    pub fn with_result(mut self, result: ToolResult) -> Self {
        if !result.success {
            self.error = result.error.clone();
        }
        self.tool_results.push(result);
        self
    }

    /// Attaches the model reply.
    pub fn with_response(mut self, response: Option<ModelResponse>) -> Self {
        self.model_response = response;
        self
    }

    /// Attaches the checkpoint decision.
    pub fn with_decision(mut self, decision: Option<Decision>) -> Self {
        self.decision = decision;
        self
    }
}

/// Mutable record of one workflow execution.
///
/// `attempts` is append-only and survives restores; everything in the
/// [`RunFrame`] is replaced by the snapshot on restore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    current_step: Option<StepName>,
    current_attempt: u32,
    pending_feedback: Option<String>,
    frame: Arc<RunFrame>,
    attempts: Vec<Attempt>,
    snapshots: HashMap<StepName, Arc<RunFrame>>,
}

impl Default for RunState {
    fn default() -> Self {
        Self::new()
    }
}

impl RunState {
    /// Creates an empty state.
    pub fn new() -> Self {
        Self {
            current_step: None,
            current_attempt: 1,
            pending_feedback: None,
            frame: Arc::new(RunFrame::default()),
            attempts: Vec::new(),
            snapshots: HashMap::new(),
        }
    }

    /// The step being processed, or `None` before the run starts.
    pub fn current_step(&self) -> Option<&StepName> {
        self.current_step.as_ref()
    }

    /// Attempt number of the current step.
    pub fn current_attempt(&self) -> u32 {
        self.current_attempt
    }

    /// Feedback waiting to be shown to the model.
    pub fn pending_feedback(&self) -> Option<&str> {
        self.pending_feedback.as_deref()
    }

    /// Latest successful payload per step.
    pub fn outputs(&self) -> &HashMap<StepName, Value> {
        &self.frame.outputs
    }

    /// Latest successful payload of `step`.
    pub fn output(&self, step: &str) -> Option<&Value> {
        self.frame.outputs.get(step)
    }

    /// The conversation so far.
    pub fn conversation(&self) -> &[Message] {
        &self.frame.conversation
    }

    /// Latest result per step.
    pub fn results(&self) -> &RunResults {
        &self.frame.results
    }

    /// Every attempt, oldest first.
    pub fn attempts(&self) -> &[Attempt] {
        &self.attempts
    }

    /// Attempts recorded for `step`, oldest first.
    pub fn attempts_for<'a>(&'a self, step: &'a str) -> impl Iterator<Item = &'a Attempt> + 'a {
        self.attempts.iter().filter(move |a| a.step == step)
    }

    /// The restorable part of the state.
    pub fn frame(&self) -> &RunFrame {
        &self.frame
    }

    /// The snapshot taken before `step` last started a visit.
    pub fn snapshot(&self, step: &str) -> Option<&RunFrame> {
        self.snapshots.get(step).map(|frame| frame.as_ref())
    }

    /// Makes `step` current, optionally snapshotting the frame first.
    pub fn enter(&mut self, step: &StepName, take_snapshot: bool) {
        self.current_step = Some(step.clone());
        if take_snapshot {
            self.snapshots.insert(step.clone(), Arc::clone(&self.frame));
        }
    }

    /// Replaces the frame with the snapshot of `step`.
    ///
    /// Returns `false` and leaves the state untouched when no snapshot exists.
    pub fn restore(&mut self, step: &str) -> bool {
        match self.snapshots.get(step) {
            Some(frame) => {
                self.frame = Arc::clone(frame);
                true
            }
            None => false,
        }
    }

    /// Drops the snapshots of `steps`, returning the names that had one.
    ///
    /// Called on rewind for every step after the target, so a later rewind
    /// forward cannot bring back a frame from the abandoned pass.
    pub fn discard_snapshots<'a>(
        &mut self,
        steps: impl IntoIterator<Item = &'a StepName>,
    ) -> Vec<StepName> {
        steps
            .into_iter()
            .filter(|step| self.snapshots.remove(*step).is_some())
            .cloned()
            .collect()
    }

    /// Appends a message to the conversation.
    pub fn push_message(&mut self, message: Message) {
        Arc::make_mut(&mut self.frame).conversation.push(message);
    }

    /// Stores a step result, and its payload when it succeeded.
    pub fn record_result(&mut self, step: &StepName, result: &ToolResult) {
        let frame = Arc::make_mut(&mut self.frame);
        if result.success {
            if let Some(data) = &result.data {
                frame.outputs.insert(step.clone(), data.clone());
            }
        }
        frame.results.insert(step.clone(), result.clone());
    }

    /// Appends to the attempt log.
    pub fn push_attempt(&mut self, attempt: Attempt) {
        self.attempts.push(attempt);
    }

    /// Sets or clears the pending feedback.
    pub fn set_feedback(&mut self, feedback: Option<String>) {
        self.pending_feedback = feedback;
    }

    /// Takes the pending feedback, leaving none.
    pub fn take_feedback(&mut self) -> Option<String> {
        self.pending_feedback.take()
    }

    /// Increments the attempt counter and returns the new value.
    pub fn next_attempt(&mut self) -> u32 {
        self.current_attempt += 1;
        self.current_attempt
    }

    /// Resets the attempt counter to 1.
    pub fn reset_attempt(&mut self) {
        self.current_attempt = 1;
    }

    /// Discards everything, including history.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}
