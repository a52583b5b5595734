//! Execution context handed to tools, and retry context keys.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::time::Instant;

/// Opaque key under which retry attempts are counted.
///
/// Callers usually derive it from a session id and a step name so unrelated
/// operations never share a retry budget.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContextKey(String);

impl ContextKey {
    /// Wraps `key`, usually `<session>:<step>:<operation>`.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The raw key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContextKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ContextKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for ContextKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for ContextKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Per-run context passed to every tool execution.
///
/// Besides the session and user ids it stores arbitrary `Send + Sync`
/// extensions (clients, feature flags) retrieved by downcasting.
///
/// # Examples
///
/// ```
/// use hataori_core::ExecutionContext;
///
/// let mut ctx = ExecutionContext::new("session-1").with_user("alice");
/// ctx.insert("max_pages", 12u32);
///
/// assert_eq!(ctx.session_id(), "session-1");
/// assert_eq!(ctx.user_id(), Some("alice"));
/// assert_eq!(ctx.get::<u32>("max_pages"), Some(&12));
/// assert_eq!(ctx.get::<String>("max_pages"), None);
/// ```
pub struct ExecutionContext {
    session_id: String,
    user_id: Option<String>,
    extensions: HashMap<String, Box<dyn Any + Send + Sync>>,
    started_at: Instant,
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("session_id", &self.session_id)
            .field("user_id", &self.user_id)
            .field("extensions", &self.extensions.keys().collect::<Vec<_>>())
            .field("started_at", &self.started_at)
            .finish()
    }
}

impl ExecutionContext {
    /// Creates a context for the given session.
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            user_id: None,
            extensions: HashMap::new(),
            started_at: Instant::now(),
        }
    }

    /// Sets the user on whose behalf the run executes.
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Returns the session id.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Returns the user id, if set.
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Inserts an extension, replacing any previous value for the key.
    pub fn insert<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.extensions.insert(key.into(), Box::new(value));
    }

    /// Returns the extension for `key` if it exists and has type `T`.
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.extensions.get(key).and_then(|v| v.downcast_ref::<T>())
    }

    /// Removes an extension and returns it if it has type `T`.
    pub fn remove<T: Any>(&mut self, key: &str) -> Option<T> {
        self.extensions
            .remove(key)
            .and_then(|v| v.downcast::<T>().ok())
            .map(|b| *b)
    }

    /// Returns `true` if an extension is stored under `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.extensions.contains_key(key)
    }

    /// Returns the time elapsed since the context was created.
    pub fn elapsed(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extensions() {
        let mut ctx = ExecutionContext::new("s");
        ctx.insert("flag", true);
        ctx.insert("name", "report".to_string());

        assert_eq!(ctx.get::<bool>("flag"), Some(&true));
        assert!(ctx.contains_key("name"));

        let removed = ctx.remove::<String>("name");
        assert_eq!(removed, Some("report".to_string()));
        assert!(!ctx.contains_key("name"));
    }

    #[test]
    fn test_context_key() {
        let key1 = ContextKey::new("run:step");
        let key2: ContextKey = "run:step".into();
        assert_eq!(key1, key2);
        assert_eq!(key1.to_string(), "run:step");
    }
}
