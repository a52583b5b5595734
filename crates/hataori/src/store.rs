//! In-memory state store and snapshot persistence.

use async_trait::async_trait;
use dashmap::DashMap;
use hataori_core::{RunState, StateStore, StepName, WorkflowError};
use std::sync::Arc;

/// Reference [`StateStore`] keeping states in a concurrent map.
///
/// States are cloned on the way in and out. Saving under an empty id is
/// rejected.
#[derive(Debug, Default)]
pub struct InMemoryStateStore {
    states: DashMap<String, RunState>,
}

impl InMemoryStateStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored states.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn save(&self, id: &str, state: &RunState) -> Result<(), WorkflowError> {
        if id.is_empty() {
            return Err(WorkflowError::Store("cannot save under an empty id".to_string()));
        }
        self.states.insert(id.to_string(), state.clone());
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Option<RunState>, WorkflowError> {
        Ok(self.states.get(id).map(|entry| entry.value().clone()))
    }

    async fn delete(&self, id: &str) -> Result<(), WorkflowError> {
        self.states.remove(id);
        Ok(())
    }

    async fn exists(&self, id: &str) -> Result<bool, WorkflowError> {
        Ok(self.states.contains_key(id))
    }
}

/// Persists per-step snapshots through a [`StateStore`] under
/// `<session>:snapshot:<step>`.
#[derive(Clone)]
pub struct SnapshotManager {
    store: Arc<dyn StateStore>,
}

impl std::fmt::Debug for SnapshotManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotManager").finish_non_exhaustive()
    }
}

impl SnapshotManager {
    /// Creates a manager writing to `store`.
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    fn key(session_id: &str, step: &StepName) -> String {
        format!("{session_id}:snapshot:{step}")
    }

    /// Stores the state taken before `step`.
    pub async fn save_snapshot(
        &self,
        session_id: &str,
        step: &StepName,
        state: &RunState,
    ) -> Result<(), WorkflowError> {
        self.store.save(&Self::key(session_id, step), state).await
    }

    /// Loads the state taken before `step`.
    pub async fn load_snapshot(
        &self,
        session_id: &str,
        step: &StepName,
    ) -> Result<Option<RunState>, WorkflowError> {
        self.store.load(&Self::key(session_id, step)).await
    }

    /// Removes the snapshot of `step`.
    pub async fn delete_snapshot(&self, session_id: &str, step: &StepName) -> Result<(), WorkflowError> {
        self.store.delete(&Self::key(session_id, step)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hataori_core::Message;

    #[tokio::test]
    async fn test_store_returns_independent_copies() {
        let store = InMemoryStateStore::new();
        let mut state = RunState::new();
        state.push_message(Message::user("hello"));
        store.save("run-1", &state).await.unwrap();

        state.push_message(Message::user("changed after save"));
        let mut loaded = store.load("run-1").await.unwrap().unwrap();
        assert_eq!(loaded.conversation().len(), 1);

        loaded.push_message(Message::user("changed after load"));
        let again = store.load("run-1").await.unwrap().unwrap();
        assert_eq!(again.conversation().len(), 1);
    }

    #[tokio::test]
    async fn test_store_delete_and_exists() {
        let store = InMemoryStateStore::new();
        assert!(!store.exists("x").await.unwrap());
        store.save("x", &RunState::new()).await.unwrap();
        assert!(store.exists("x").await.unwrap());
        store.delete("x").await.unwrap();
        store.delete("x").await.unwrap();
        assert!(store.load("x").await.unwrap().is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_store_rejects_empty_id() {
        let store = InMemoryStateStore::new();
        let error = store.save("", &RunState::new()).await.unwrap_err();
        assert!(matches!(error, WorkflowError::Store(_)));
        assert_eq!(error.to_string(), "State store error: cannot save under an empty id");
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_keys() {
        let store = Arc::new(InMemoryStateStore::new());
        let manager = SnapshotManager::new(store.clone());
        let step = StepName::new("outline");

        manager
            .save_snapshot("run-1", &step, &RunState::new())
            .await
            .unwrap();
        assert!(store.exists("run-1:snapshot:outline").await.unwrap());
        assert!(manager.load_snapshot("run-1", &step).await.unwrap().is_some());
        assert!(manager.load_snapshot("run-2", &step).await.unwrap().is_none());

        manager.delete_snapshot("run-1", &step).await.unwrap();
        assert!(store.is_empty());
    }
}
