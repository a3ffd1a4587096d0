//! Session manager: the server-side face of the session store.
//!
//! Wraps the configured [`Checkpointer`] backend, owns the per-task
//! revision counters for the conditional-write policy, and absorbs
//! persistence failures so they never block the graph or an API call.

use chrono::Utc;
use parking_lot::Mutex;
use review_checkpoint::{unbound_graph_state, Checkpointer, SessionRecord};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Server-side session persistence.
pub struct SessionManager {
    store: Arc<dyn Checkpointer>,
    revisions: Mutex<HashMap<String, u64>>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn Checkpointer>) -> Self {
        Self {
            store,
            revisions: Mutex::new(HashMap::new()),
        }
    }

    fn next_revision(&self, task_id: &str) -> u64 {
        let mut revisions = self.revisions.lock();
        let revision = revisions.entry(task_id.to_string()).or_insert(0);
        *revision += 1;
        *revision
    }

    /// Persist a session snapshot. Failures are logged, never returned.
    pub async fn save(
        &self,
        task_id: &str,
        user_id: &str,
        domain_id: &str,
        status: &str,
        is_complete: bool,
        graph_state: Value,
    ) {
        let record = SessionRecord {
            task_id: task_id.to_string(),
            user_id: user_id.to_string(),
            domain_id: domain_id.to_string(),
            status: status.to_string(),
            is_complete,
            error: None,
            graph_state,
            last_access_ts: Utc::now(),
            revision: self.next_revision(task_id),
        };
        if let Err(err) = self.store.save_session(record).await {
            warn!(task_id, %err, "session save failed; in-memory state continues");
        }
    }

    /// Load a session, unwrapping any compression envelope on the state.
    pub async fn load(&self, task_id: &str) -> Option<SessionRecord> {
        match self.store.load_session(task_id).await {
            Ok(Some(mut record)) => {
                record.graph_state = unbound_graph_state(&record.graph_state);
                // Keep our revision counter ahead of whatever is stored.
                let mut revisions = self.revisions.lock();
                let entry = revisions.entry(task_id.to_string()).or_insert(0);
                *entry = (*entry).max(record.revision);
                Some(record)
            }
            Ok(None) => None,
            Err(err) => {
                warn!(task_id, %err, "session load failed");
                None
            }
        }
    }

    /// Update only status fields. Failures are logged, never returned.
    pub async fn update_status(
        &self,
        task_id: &str,
        status: &str,
        is_complete: bool,
        error: Option<String>,
    ) {
        if let Err(err) = self
            .store
            .update_session_status(task_id, status, is_complete, error)
            .await
        {
            warn!(task_id, %err, "session status update failed");
        }
    }

    pub async fn touch(&self, task_id: &str) {
        if let Err(err) = self.store.touch(task_id).await {
            warn!(task_id, %err, "session touch failed");
        }
    }

    pub async fn delete(&self, task_id: &str) {
        self.revisions.lock().remove(task_id);
        if let Err(err) = self.store.delete_session(task_id).await {
            warn!(task_id, %err, "session delete failed");
        }
    }
}
