//! In-memory session store, the reference [`Checkpointer`] implementation.

use crate::error::{CheckpointError, Result};
use crate::guard::bound_graph_state;
use crate::record::SessionRecord;
use crate::traits::Checkpointer;
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::debug;

/// Keeps sessions in a process-local map. Used by tests and as the default
/// backend when no database is configured.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<String, SessionRecord>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

#[async_trait]
impl Checkpointer for MemorySessionStore {
    async fn save_session(&self, mut record: SessionRecord) -> Result<()> {
        record.graph_state = bound_graph_state(&record.graph_state);
        record.last_access_ts = Utc::now();

        let mut sessions = self.sessions.write();
        if let Some(existing) = sessions.get(&record.task_id) {
            if existing.revision >= record.revision {
                return Err(CheckpointError::StaleRevision {
                    task_id: record.task_id,
                    incoming: record.revision,
                    stored: existing.revision,
                });
            }
        }
        debug!(task_id = %record.task_id, revision = record.revision, "session saved");
        sessions.insert(record.task_id.clone(), record);
        Ok(())
    }

    async fn load_session(&self, task_id: &str) -> Result<Option<SessionRecord>> {
        Ok(self.sessions.read().get(task_id).cloned())
    }

    async fn update_session_status(
        &self,
        task_id: &str,
        status: &str,
        is_complete: bool,
        error: Option<String>,
    ) -> Result<()> {
        let mut sessions = self.sessions.write();
        let record = sessions
            .get_mut(task_id)
            .ok_or_else(|| CheckpointError::NotFound(task_id.to_string()))?;
        record.status = status.to_string();
        record.is_complete = is_complete;
        record.error = error;
        record.last_access_ts = Utc::now();
        Ok(())
    }

    async fn touch(&self, task_id: &str) -> Result<()> {
        if let Some(record) = self.sessions.write().get_mut(task_id) {
            record.last_access_ts = Utc::now();
        }
        Ok(())
    }

    async fn delete_session(&self, task_id: &str) -> Result<()> {
        self.sessions.write().remove(task_id);
        Ok(())
    }

    async fn list_task_ids(&self) -> Result<Vec<String>> {
        Ok(self.sessions.read().keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::MAX_STATE_BYTES;
    use serde_json::json;

    fn record(task_id: &str, revision: u64) -> SessionRecord {
        let mut r = SessionRecord::new(task_id, "u1", "construction", "reviewing");
        r.revision = revision;
        r
    }

    #[tokio::test]
    async fn save_and_load() {
        let store = MemorySessionStore::new();
        store
            .save_session(record("t1", 1).with_graph_state(json!({"current_clause_index": 0})))
            .await
            .unwrap();

        let loaded = store.load_session("t1").await.unwrap().unwrap();
        assert_eq!(loaded.status, "reviewing");
        assert_eq!(loaded.graph_state["current_clause_index"], 0);
        assert!(store.load_session("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stale_revision_rejected() {
        let store = MemorySessionStore::new();
        store.save_session(record("t1", 2)).await.unwrap();

        let err = store.save_session(record("t1", 2)).await.unwrap_err();
        assert!(matches!(err, CheckpointError::StaleRevision { stored: 2, .. }));

        // A newer revision goes through.
        store.save_session(record("t1", 3)).await.unwrap();
        assert_eq!(store.load_session("t1").await.unwrap().unwrap().revision, 3);
    }

    #[tokio::test]
    async fn update_status() {
        let store = MemorySessionStore::new();
        store.save_session(record("t1", 1)).await.unwrap();
        store
            .update_session_status("t1", "failed", false, Some("boom".to_string()))
            .await
            .unwrap();

        let loaded = store.load_session("t1").await.unwrap().unwrap();
        assert_eq!(loaded.status, "failed");
        assert_eq!(loaded.error.as_deref(), Some("boom"));

        let err = store
            .update_session_status("missing", "failed", false, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckpointError::NotFound(_)));
    }

    #[tokio::test]
    async fn oversize_graph_state_is_bounded_on_save() {
        let store = MemorySessionStore::new();
        let huge = json!({"task_id": "t1", "blob": "x".repeat(6 * 1024 * 1024)});
        store
            .save_session(record("t1", 1).with_graph_state(huge))
            .await
            .unwrap();

        let stored = store.load_session("t1").await.unwrap().unwrap();
        assert!(stored.graph_state.to_string().len() <= MAX_STATE_BYTES);
    }

    #[tokio::test]
    async fn delete_and_list() {
        let store = MemorySessionStore::new();
        store.save_session(record("t1", 1)).await.unwrap();
        store.save_session(record("t2", 1)).await.unwrap();
        assert_eq!(store.list_task_ids().await.unwrap().len(), 2);

        store.delete_session("t1").await.unwrap();
        assert_eq!(store.list_task_ids().await.unwrap(), vec!["t2".to_string()]);
    }
}
