//! Structured data from free-text model replies.

use crate::model::ModelResponse;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::LazyLock;

#[allow(clippy::expect_used)]
static FENCE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_+.-]*[ \t]*\r?\n?(.*?)```").expect("Invalid regex pattern")
});

/// Returns the body of the last fenced block in `text`, trimmed.
///
/// Text without a complete fence is returned trimmed.
pub fn strip_fence(text: &str) -> &str {
    FENCE_PATTERN
        .captures_iter(text)
        .last()
        .and_then(|caps| caps.get(1))
        .map_or(text, |body| body.as_str())
        .trim()
}

/// Parses a model reply into JSON.
///
/// Never fails: text that does not parse is wrapped as
/// `{"response": <text>}`.
///
/// ```
/// use hataori_core::extract_structured;
/// use serde_json::json;
///
/// let reply = "Here you go:\n```json\n{\"title\": \"Rust\"}\n```";
/// assert_eq!(extract_structured(reply), json!({"title": "Rust"}));
/// assert_eq!(extract_structured("no idea"), json!({"response": "no idea"}));
/// ```
pub fn extract_structured(text: &str) -> Value {
    serde_json::from_str(strip_fence(text)).unwrap_or_else(|_| json!({ "response": text }))
}

/// Outcome of validating a model reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Whether the reply is acceptable.
    pub valid: bool,
    /// What was wrong.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// A message to send back to the model asking for a corrected reply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_prompt: Option<String>,
}

impl ValidationResult {
    fn ok() -> Self {
        Self {
            valid: true,
            error: None,
            retry_prompt: None,
        }
    }

    fn invalid(error: impl Into<String>, retry_prompt: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(error.into()),
            retry_prompt: Some(retry_prompt.into()),
        }
    }

    fn empty() -> Self {
        Self::invalid(
            "Empty response",
            "You returned an empty response. Please try again.",
        )
    }
}

/// Checks that model replies carry JSON, optionally of a given shape.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseValidator;

impl ResponseValidator {
    /// Creates a validator.
    pub fn new() -> Self {
        Self
    }

    /// Checks that the reply content is JSON.
    pub fn validate_json(&self, response: &ModelResponse) -> ValidationResult {
        let Some(payload) = payload_of(response) else {
            return ValidationResult::empty();
        };
        match serde_json::from_str::<Value>(payload) {
            Ok(_) => ValidationResult::ok(),
            Err(e) => ValidationResult::invalid(
                e.to_string(),
                format!("Your response was not valid JSON: {e}. Return only valid JSON."),
            ),
        }
    }

    /// Checks that the reply content deserializes into `T`.
    pub fn validate_as<T: DeserializeOwned>(&self, response: &ModelResponse) -> ValidationResult {
        let Some(payload) = payload_of(response) else {
            return ValidationResult::empty();
        };
        match serde_json::from_str::<T>(payload) {
            Ok(_) => ValidationResult::ok(),
            Err(e) if e.is_data() => ValidationResult::invalid(
                e.to_string(),
                format!("Your response didn't match the expected format: {e}. Fix it."),
            ),
            Err(e) => ValidationResult::invalid(
                e.to_string(),
                format!("Your response was not valid JSON: {e}. Return only valid JSON."),
            ),
        }
    }
}

fn payload_of(response: &ModelResponse) -> Option<&str> {
    response
        .content
        .as_deref()
        .map(strip_fence)
        .filter(|payload| !payload.is_empty())
}
