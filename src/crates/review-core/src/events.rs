//! Event taxonomy pushed to clients over the per-task channel.

use crate::state::DocumentDiff;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Events emitted while a review runs.
///
/// Every event names its task; the event bus stamps the per-task sequence
/// number when the event is published, so ordering is observable by
/// clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ReviewEvent {
    ReviewStarted {
        task_id: String,
        total_clauses: usize,
    },
    ReviewProgress {
        task_id: String,
        current_clause_index: usize,
        total: usize,
    },
    ToolCall {
        task_id: String,
        clause_id: String,
        skill_id: String,
        /// Digest of the arguments, not the full payload.
        args_digest: String,
    },
    ToolResult {
        task_id: String,
        clause_id: String,
        skill_id: String,
        success: bool,
        summary: String,
    },
    MessageDelta {
        task_id: String,
        clause_id: String,
        delta: String,
    },
    DiffProposed {
        task_id: String,
        clause_id: String,
        diff: DocumentDiff,
    },
    ApprovalRequired {
        task_id: String,
        clause_id: String,
        pending_diffs: Vec<DocumentDiff>,
    },
    DocUpdate {
        task_id: String,
        clause_id: String,
        diff: DocumentDiff,
    },
    ReviewCompleted {
        task_id: String,
        total_risks: usize,
        approved_diffs: usize,
        summary: String,
    },
    Error {
        task_id: String,
        kind: String,
        message: String,
    },
    Done {
        task_id: String,
    },
}

impl ReviewEvent {
    /// SSE event name.
    pub fn event_type(&self) -> &'static str {
        match self {
            ReviewEvent::ReviewStarted { .. } => "review_started",
            ReviewEvent::ReviewProgress { .. } => "review_progress",
            ReviewEvent::ToolCall { .. } => "tool_call",
            ReviewEvent::ToolResult { .. } => "tool_result",
            ReviewEvent::MessageDelta { .. } => "message_delta",
            ReviewEvent::DiffProposed { .. } => "diff_proposed",
            ReviewEvent::ApprovalRequired { .. } => "approval_required",
            ReviewEvent::DocUpdate { .. } => "doc_update",
            ReviewEvent::ReviewCompleted { .. } => "review_completed",
            ReviewEvent::Error { .. } => "error",
            ReviewEvent::Done { .. } => "done",
        }
    }

    pub fn task_id(&self) -> &str {
        match self {
            ReviewEvent::ReviewStarted { task_id, .. }
            | ReviewEvent::ReviewProgress { task_id, .. }
            | ReviewEvent::ToolCall { task_id, .. }
            | ReviewEvent::ToolResult { task_id, .. }
            | ReviewEvent::MessageDelta { task_id, .. }
            | ReviewEvent::DiffProposed { task_id, .. }
            | ReviewEvent::ApprovalRequired { task_id, .. }
            | ReviewEvent::DocUpdate { task_id, .. }
            | ReviewEvent::ReviewCompleted { task_id, .. }
            | ReviewEvent::Error { task_id, .. }
            | ReviewEvent::Done { task_id } => task_id,
        }
    }

    /// JSON payload for the SSE `data:` line, without the envelope tag.
    pub fn payload(&self) -> Value {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map.get("data").cloned().unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }
}

/// Where graph and agent loop push their events. Implemented by the SSE
/// bus in the server and by collectors in tests. Emission must not block.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: ReviewEvent);
}

/// Sink that drops everything.
#[derive(Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: ReviewEvent) {}
}

/// Sink that collects events for assertions.
#[derive(Default)]
pub struct VecSink {
    events: Mutex<Vec<ReviewEvent>>,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ReviewEvent> {
        self.events.lock().clone()
    }

    /// Count of events with the given SSE name.
    pub fn count(&self, event_type: &str) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| e.event_type() == event_type)
            .count()
    }
}

impl EventSink for VecSink {
    fn emit(&self, event: ReviewEvent) {
        self.events.lock().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_names_match_the_wire_protocol() {
        let event = ReviewEvent::ReviewProgress {
            task_id: "t1".into(),
            current_clause_index: 0,
            total: 3,
        };
        assert_eq!(event.event_type(), "review_progress");
        assert_eq!(
            ReviewEvent::ApprovalRequired {
                task_id: "t1".into(),
                clause_id: "1.1".into(),
                pending_diffs: vec![]
            }
            .event_type(),
            "approval_required"
        );
        assert_eq!(ReviewEvent::Done { task_id: "t".into() }.event_type(), "done");
    }

    #[test]
    fn payload_carries_task_id() {
        let event = ReviewEvent::ReviewStarted {
            task_id: "t1".into(),
            total_clauses: 2,
        };
        let payload = event.payload();
        assert_eq!(payload["task_id"], "t1");
        assert_eq!(payload["total_clauses"], 2);
    }

    #[test]
    fn vec_sink_collects_in_order() {
        let sink = VecSink::new();
        sink.emit(ReviewEvent::ReviewStarted { task_id: "t".into(), total_clauses: 1 });
        sink.emit(ReviewEvent::Done { task_id: "t".into() });
        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type(), "review_started");
        assert_eq!(sink.count("done"), 1);
    }
}
