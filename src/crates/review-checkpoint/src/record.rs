//! The persisted session record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Durable snapshot of a review task.
///
/// `graph_state` is opaque JSON owned by the graph layer; this crate only
/// bounds its size. `revision` increases monotonically per task and backs
/// the conditional-write policy for stores shared across processes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub task_id: String,
    pub user_id: String,
    pub domain_id: String,
    pub status: String,
    pub is_complete: bool,
    #[serde(default)]
    pub error: Option<String>,
    pub graph_state: Value,
    pub last_access_ts: DateTime<Utc>,
    pub revision: u64,
}

impl SessionRecord {
    pub fn new(
        task_id: impl Into<String>,
        user_id: impl Into<String>,
        domain_id: impl Into<String>,
        status: impl Into<String>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            user_id: user_id.into(),
            domain_id: domain_id.into(),
            status: status.into(),
            is_complete: false,
            error: None,
            graph_state: Value::Null,
            last_access_ts: Utc::now(),
            revision: 0,
        }
    }

    pub fn with_graph_state(mut self, graph_state: Value) -> Self {
        self.graph_state = graph_state;
        self
    }

    /// True for statuses a session can no longer leave.
    pub fn is_terminal(&self) -> bool {
        matches!(self.status.as_str(), "completed" | "failed")
    }
}
