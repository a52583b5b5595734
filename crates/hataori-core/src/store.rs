//! State persistence interface.

use crate::error::WorkflowError;
use crate::state::RunState;
use async_trait::async_trait;

/// Persists run state between steps or across processes.
///
/// Implementations must hand out independent copies: mutating a loaded
/// state never affects what is stored. Backend failures are reported as
/// [`WorkflowError::Store`]; the engine logs them and keeps running.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Stores `state` under `id`, replacing any previous value.
    async fn save(&self, id: &str, state: &RunState) -> Result<(), WorkflowError>;

    /// Loads the state stored under `id`.
    async fn load(&self, id: &str) -> Result<Option<RunState>, WorkflowError>;

    /// Removes the state stored under `id`; missing ids are not an error.
    async fn delete(&self, id: &str) -> Result<(), WorkflowError>;

    /// Returns `true` if a state is stored under `id`.
    async fn exists(&self, id: &str) -> Result<bool, WorkflowError> {
        Ok(self.load(id).await?.is_some())
    }
}
