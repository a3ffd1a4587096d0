//! The checkpointer trait implemented by session stores.

use crate::error::Result;
use crate::record::SessionRecord;
use async_trait::async_trait;

/// Persistence interface for review sessions.
///
/// The graph runner writes through this after every node; the API layer
/// reads through it for status and rehydration. Implementations must apply
/// the conditional-write policy: a save whose `revision` is not strictly
/// greater than the stored one is rejected with
/// [`CheckpointError::StaleRevision`](crate::CheckpointError::StaleRevision)
/// so concurrent writers cannot clobber newer state.
#[async_trait]
pub trait Checkpointer: Send + Sync {
    /// Insert or update the session record.
    async fn save_session(&self, record: SessionRecord) -> Result<()>;

    /// Load a session by task id, `None` when absent.
    async fn load_session(&self, task_id: &str) -> Result<Option<SessionRecord>>;

    /// Update only the status fields of an existing session.
    async fn update_session_status(
        &self,
        task_id: &str,
        status: &str,
        is_complete: bool,
        error: Option<String>,
    ) -> Result<()>;

    /// Refresh the last-access timestamp.
    async fn touch(&self, task_id: &str) -> Result<()>;

    /// Remove a session and everything attached to it.
    async fn delete_session(&self, task_id: &str) -> Result<()>;

    /// Task ids of all stored sessions; used by the idle sweep.
    async fn list_task_ids(&self) -> Result<Vec<String>>;
}
