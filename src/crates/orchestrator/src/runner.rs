//! Per-task graph execution.
//!
//! The runner owns the active-graphs table: one entry per live task, each
//! driven by a single cooperative tokio task. All state mutations for a
//! task are serialized through its entry lock, and the graph state itself
//! is taken out of the entry while a run is in flight, so approvals and
//! uploads can only touch a parked task.

use crate::api::sse::EventBus;
use crate::plugins::PluginRegistry;
use crate::services::{QuotaService, SessionManager};
use crate::storage::BlobStorage;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use parser::{ClauseTree, StructureParser};
use review_core::graph::CheckpointSink;
use review_core::{
    prompts, ChatModel, ChatRequest, Decision, DocumentRole, EventSink, GraphConfig, GraphState,
    ReviewError, ReviewEvent, ReviewGraph, Result, RunOutcome, TaskStatus,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use skills::{SkillDispatcher, SkillRegistry, SkillResources};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex as AsyncMutex};
use tracing::{info, warn};

/// Maximum accepted upload size: 10 MiB.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Metadata of one attached document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub role: DocumentRole,
    pub filename: String,
    pub total_clauses: usize,
}

/// One turn of the per-item refinement chat. Append-only per item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
    #[serde(default)]
    pub suggestion_snapshot: Option<Value>,
    pub timestamp: DateTime<Utc>,
}

/// Snapshot returned by the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct StatusView {
    pub task_id: String,
    pub status: String,
    pub current_clause_index: usize,
    pub total_clauses: usize,
    pub findings: usize,
    pub risks: usize,
    pub pending_diffs: usize,
    pub is_complete: bool,
}

/// Clause lookup result for the context endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ClauseContextView {
    pub clause_id: String,
    pub title: String,
    pub text: String,
    pub level: usize,
}

struct TaskEntry {
    task_id: String,
    user_id: String,
    domain_id: String,
    language: String,
    our_party: String,
    status: TaskStatus,
    /// Parked graph state; `None` while a run is in flight.
    state: Option<GraphState>,
    documents: Vec<DocumentMeta>,
    trees: HashMap<DocumentRole, Arc<ClauseTree>>,
    cancel: watch::Sender<bool>,
    chats: BTreeMap<String, Vec<ChatTurn>>,
    last_access: Instant,
}

impl TaskEntry {
    fn is_running(&self) -> bool {
        self.state.is_none() && !self.status.is_terminal()
    }
}

/// Writes checkpoints for one run, wrapping the graph state together with
/// the task's document metadata so rehydration can rebuild everything.
struct RunnerCheckpointSink {
    sessions: Arc<SessionManager>,
    task_id: String,
    user_id: String,
    domain_id: String,
    extra: Value,
}

#[async_trait::async_trait]
impl CheckpointSink for RunnerCheckpointSink {
    async fn checkpoint(&self, state: &GraphState, status: TaskStatus) {
        let graph = match state.to_json() {
            Ok(graph) => graph,
            Err(err) => {
                warn!(task_id = %self.task_id, %err, "graph state not serializable, skipping checkpoint");
                return;
            }
        };
        let mut wrapper = json!({"graph": graph});
        if let (Value::Object(target), Value::Object(extra)) = (&mut wrapper, &self.extra) {
            for (key, value) in extra {
                target.insert(key.clone(), value.clone());
            }
        }
        self.sessions
            .save(
                &self.task_id,
                &self.user_id,
                &self.domain_id,
                status.as_str(),
                state.is_complete,
                wrapper,
            )
            .await;
    }
}

/// The active-graphs table and everything needed to drive graphs.
pub struct TaskRunner {
    model: Arc<dyn ChatModel>,
    skills: Arc<SkillRegistry>,
    plugins: Arc<PluginRegistry>,
    sessions: Arc<SessionManager>,
    quota: Arc<QuotaService>,
    events: Arc<EventBus>,
    storage: Arc<BlobStorage>,
    active: Mutex<HashMap<String, Arc<AsyncMutex<TaskEntry>>>>,
}

impl TaskRunner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        model: Arc<dyn ChatModel>,
        skills: Arc<SkillRegistry>,
        plugins: Arc<PluginRegistry>,
        sessions: Arc<SessionManager>,
        quota: Arc<QuotaService>,
        events: Arc<EventBus>,
        storage: Arc<BlobStorage>,
    ) -> Self {
        Self {
            model,
            skills,
            plugins,
            sessions,
            quota,
            events,
            storage,
            active: Mutex::new(HashMap::new()),
        }
    }

    fn entry(&self, task_id: &str) -> Option<Arc<AsyncMutex<TaskEntry>>> {
        self.active.lock().get(task_id).cloned()
    }

    pub fn active_task_ids(&self) -> Vec<String> {
        self.active.lock().keys().cloned().collect()
    }

    /// Owner of an active task, for the API's ownership checks.
    pub async fn owner(&self, task_id: &str) -> Option<String> {
        let entry = self.entry(task_id)?;
        let entry = entry.lock().await;
        Some(entry.user_id.clone())
    }

    /// Create a task and optionally launch its graph.
    pub async fn create_task(
        &self,
        task_id: &str,
        user_id: &str,
        domain_id: &str,
        language: &str,
        our_party: &str,
        auto_start: bool,
    ) -> Result<TaskStatus> {
        let checklist = self.plugins.checklist(domain_id);
        let state = GraphState::new(task_id, domain_id, language, checklist);
        let (cancel, _rx) = watch::channel(false);

        let entry = TaskEntry {
            task_id: task_id.to_string(),
            user_id: user_id.to_string(),
            domain_id: domain_id.to_string(),
            language: language.to_string(),
            our_party: our_party.to_string(),
            status: if auto_start { TaskStatus::Reviewing } else { TaskStatus::Ready },
            state: Some(state),
            documents: Vec::new(),
            trees: HashMap::new(),
            cancel,
            chats: BTreeMap::new(),
            last_access: Instant::now(),
        };

        let entry_arc = {
            let mut active = self.active.lock();
            if active.contains_key(task_id) {
                return Err(ReviewError::Conflict(format!("task {task_id} already exists")));
            }
            let arc = Arc::new(AsyncMutex::new(entry));
            active.insert(task_id.to_string(), arc.clone());
            arc
        };

        {
            let entry = entry_arc.lock().await;
            self.persist_entry(&entry).await;
        }
        if auto_start {
            self.spawn_run(entry_arc.clone()).await?;
            Ok(TaskStatus::Reviewing)
        } else {
            Ok(TaskStatus::Ready)
        }
    }

    /// Make sure a task is in the active table, rehydrating from the
    /// session store when necessary.
    pub async fn ensure_active(&self, task_id: &str) -> Result<()> {
        if self.entry(task_id).is_some() {
            return Ok(());
        }
        self.rehydrate(task_id).await.map(|_| ())
    }

    /// Attach a document: parse it, store the blob, and replace any
    /// earlier document of the same role.
    pub async fn upload_document(
        &self,
        task_id: &str,
        role: DocumentRole,
        filename: &str,
        bytes: &[u8],
        language: Option<String>,
        our_party: Option<String>,
    ) -> Result<usize> {
        let entry_arc = self
            .entry(task_id)
            .ok_or_else(|| ReviewError::NotFound(format!("task {task_id}")))?;
        let mut entry = entry_arc.lock().await;
        if entry.is_running() {
            return Err(ReviewError::Conflict(
                "cannot attach documents while the review is running".to_string(),
            ));
        }
        if entry.status.is_terminal() {
            return Err(ReviewError::Conflict("task is in a terminal state".to_string()));
        }

        let text = std::str::from_utf8(bytes)
            .map_err(|_| ReviewError::Validation("file is not valid UTF-8 text".to_string()))?;
        let parser = StructureParser::new(self.plugins.parser_config(&entry.domain_id));
        let tree = Arc::new(
            parser
                .parse(text)
                .map_err(|e| ReviewError::Validation(format!("document did not parse: {e}")))?,
        );
        let total_clauses = tree.total_clauses;

        self.storage
            .put(&entry.user_id, task_id, role, filename, bytes)
            .await?;

        if let Some(language) = language {
            entry.language = language.clone();
            if let Some(state) = entry.state.as_mut() {
                state.language = language;
            }
        }
        if let Some(our_party) = our_party {
            entry.our_party = our_party;
        }
        entry.trees.insert(role, tree);
        entry.documents.retain(|d| d.role != role);
        entry.documents.push(DocumentMeta {
            role,
            filename: filename.to_string(),
            total_clauses,
        });
        entry.last_access = Instant::now();
        self.persist_entry(&entry).await;
        info!(task_id, role = role.as_str(), filename, total_clauses, "document attached");
        Ok(total_clauses)
    }

    pub async fn list_documents(&self, task_id: &str) -> Result<Vec<DocumentMeta>> {
        let entry_arc = self
            .entry(task_id)
            .ok_or_else(|| ReviewError::NotFound(format!("task {task_id}")))?;
        let entry = entry_arc.lock().await;
        Ok(entry.documents.clone())
    }

    /// Launch the graph for a manually-started task.
    pub async fn run(&self, task_id: &str) -> Result<&'static str> {
        let entry_arc = self
            .entry(task_id)
            .ok_or_else(|| ReviewError::NotFound(format!("task {task_id}")))?;
        {
            let entry = entry_arc.lock().await;
            if entry.is_running() {
                return Ok("already_running");
            }
            if entry.status.is_terminal() {
                return Err(ReviewError::Conflict("task is in a terminal state".to_string()));
            }
            if entry.status == TaskStatus::AwaitingApproval {
                return Err(ReviewError::Conflict(
                    "task is awaiting approval; post decisions and resume".to_string(),
                ));
            }
        }
        self.spawn_run(entry_arc).await?;
        Ok("started")
    }

    /// Record one approval decision.
    pub async fn approve(
        &self,
        task_id: &str,
        diff_id: &str,
        decision: Decision,
        feedback: Option<String>,
    ) -> Result<()> {
        let entry_arc = self
            .entry(task_id)
            .ok_or_else(|| ReviewError::NotFound(format!("task {task_id}")))?;
        let mut entry = entry_arc.lock().await;
        let state = entry
            .state
            .as_mut()
            .ok_or_else(|| ReviewError::Conflict("review is running".to_string()))?;
        if !state.pending_diffs.iter().any(|d| d.diff_id == diff_id) {
            return Err(ReviewError::NotFound(format!("diff {diff_id}")));
        }
        state.user_decisions.insert(diff_id.to_string(), decision);
        if let Some(feedback) = feedback {
            state.user_feedback.insert(diff_id.to_string(), feedback);
        }
        entry.last_access = Instant::now();
        self.persist_entry(&entry).await;
        Ok(())
    }

    /// Validate decisions and leave the approval interrupt.
    pub async fn resume(&self, task_id: &str) -> Result<&'static str> {
        let entry_arc = self
            .entry(task_id)
            .ok_or_else(|| ReviewError::NotFound(format!("task {task_id}")))?;
        {
            let mut entry = entry_arc.lock().await;
            if entry.is_running() {
                return Ok("already_running");
            }
            let graph = self.build_graph(&entry);
            let state = entry
                .state
                .as_mut()
                .ok_or_else(|| ReviewError::Conflict("review is running".to_string()))?;
            if state.pending_diffs.is_empty() && state.node != review_core::ReviewNode::HumanApproval
            {
                return Err(ReviewError::Conflict("task is not awaiting approval".to_string()));
            }
            graph.prepare_resume(state)?;
        }
        self.spawn_run(entry_arc).await?;
        Ok("resumed")
    }

    /// Rebuild an active entry from the session store.
    pub async fn rehydrate(&self, task_id: &str) -> Result<TaskStatus> {
        if let Some(entry_arc) = self.entry(task_id) {
            let entry = entry_arc.lock().await;
            return Ok(entry.status);
        }

        let record = self
            .sessions
            .load(task_id)
            .await
            .ok_or_else(|| ReviewError::NotFound(format!("session {task_id}")))?;
        if record.is_terminal() {
            return Err(ReviewError::Conflict(format!(
                "task {task_id} is {} and cannot be rehydrated",
                record.status
            )));
        }

        let graph_value = record
            .graph_state
            .get("graph")
            .cloned()
            .ok_or_else(|| ReviewError::Serialization("session has no graph state".to_string()))?;
        let state = GraphState::from_json(graph_value)?;
        let documents: Vec<DocumentMeta> = record
            .graph_state
            .get("documents")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();
        let chats: BTreeMap<String, Vec<ChatTurn>> = record
            .graph_state
            .get("chats")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();
        let our_party = record.graph_state["our_party"]
            .as_str()
            .unwrap_or_default()
            .to_string();

        let parser = StructureParser::new(self.plugins.parser_config(&record.domain_id));
        let mut trees = HashMap::new();
        for doc in &documents {
            match self
                .storage
                .get(&record.user_id, task_id, doc.role, &doc.filename)
                .await?
            {
                Some(bytes) => {
                    let text = String::from_utf8_lossy(&bytes).to_string();
                    match parser.parse(&text) {
                        Ok(tree) => {
                            trees.insert(doc.role, Arc::new(tree));
                        }
                        Err(err) => {
                            warn!(task_id, filename = %doc.filename, %err, "stored document no longer parses");
                        }
                    }
                }
                None => {
                    warn!(task_id, filename = %doc.filename, "stored document blob is missing");
                }
            }
        }

        let status = TaskStatus::parse(&record.status).unwrap_or(TaskStatus::Created);
        let (cancel, _rx) = watch::channel(false);
        let entry = TaskEntry {
            task_id: task_id.to_string(),
            user_id: record.user_id.clone(),
            domain_id: record.domain_id.clone(),
            language: state.language.clone(),
            our_party,
            status,
            state: Some(state),
            documents,
            trees,
            cancel,
            chats,
            last_access: Instant::now(),
        };
        self.active
            .lock()
            .insert(task_id.to_string(), Arc::new(AsyncMutex::new(entry)));
        self.sessions.touch(task_id).await;
        info!(task_id, status = status.as_str(), "session rehydrated");
        Ok(status)
    }

    /// Status snapshot, readable whether or not a run is in flight.
    pub async fn status(&self, task_id: &str) -> Result<StatusView> {
        let entry_arc = self
            .entry(task_id)
            .ok_or_else(|| ReviewError::NotFound(format!("task {task_id}")))?;
        let mut entry = entry_arc.lock().await;
        entry.last_access = Instant::now();

        if let Some(state) = &entry.state {
            return Ok(view_from_state(task_id, entry.status, state));
        }
        // Run in flight: read the latest checkpoint.
        match self.sessions.load(task_id).await {
            Some(record) => Ok(view_from_value(
                task_id,
                entry.status,
                record.graph_state.get("graph").unwrap_or(&Value::Null),
            )),
            None => Ok(StatusView {
                task_id: task_id.to_string(),
                status: entry.status.as_str().to_string(),
                current_clause_index: 0,
                total_clauses: 0,
                findings: 0,
                risks: 0,
                pending_diffs: 0,
                is_complete: false,
            }),
        }
    }

    pub async fn clause_context(&self, task_id: &str, clause_id: &str) -> Result<ClauseContextView> {
        let entry_arc = self
            .entry(task_id)
            .ok_or_else(|| ReviewError::NotFound(format!("task {task_id}")))?;
        let entry = entry_arc.lock().await;
        let tree = entry
            .trees
            .get(&DocumentRole::Primary)
            .ok_or_else(|| ReviewError::NotFound("no primary document".to_string()))?;
        let node = tree
            .find(clause_id)
            .ok_or_else(|| ReviewError::NotFound(format!("clause {clause_id}")))?;
        Ok(ClauseContextView {
            clause_id: node.clause_id.clone(),
            title: node.title.clone(),
            text: node.text.clone(),
            level: node.level,
        })
    }

    /// Cancel a task. In-flight work observes the signal at the next
    /// checkpoint boundary; a parked task fails immediately.
    pub async fn cancel(&self, task_id: &str) -> Result<()> {
        let entry_arc = self
            .entry(task_id)
            .ok_or_else(|| ReviewError::NotFound(format!("task {task_id}")))?;
        let mut entry = entry_arc.lock().await;
        let _ = entry.cancel.send(true);
        if let Some(state) = entry.state.as_mut() {
            state.node = review_core::ReviewNode::Failed;
            entry.status = TaskStatus::Failed;
            let task = entry.task_id.clone();
            self.events.emit(ReviewEvent::Error {
                task_id: task,
                kind: "cancelled".to_string(),
                message: "task cancelled".to_string(),
            });
            self.persist_entry(&entry).await;
        }
        Ok(())
    }

    /// Refinement chat on one reviewed item.
    pub async fn item_chat(&self, task_id: &str, clause_id: &str, message: &str) -> Result<String> {
        let entry_arc = self
            .entry(task_id)
            .ok_or_else(|| ReviewError::NotFound(format!("task {task_id}")))?;
        let mut entry = entry_arc.lock().await;
        let state = entry
            .state
            .as_ref()
            .ok_or_else(|| ReviewError::Conflict("review is running".to_string()))?;

        let clause_text = entry
            .trees
            .get(&DocumentRole::Primary)
            .and_then(|t| t.find(clause_id))
            .map(|n| n.text.clone())
            .unwrap_or_default();
        let diffs: Vec<_> = state
            .findings
            .get(clause_id)
            .map(|f| f.diffs.clone())
            .unwrap_or_else(|| {
                state
                    .pending_diffs
                    .iter()
                    .filter(|d| d.clause_id == clause_id)
                    .cloned()
                    .collect()
            });
        if clause_text.is_empty() && diffs.is_empty() && !state.findings.contains_key(clause_id) {
            return Err(ReviewError::NotFound(format!("clause {clause_id}")));
        }

        let messages = prompts::build_item_chat_messages(&clause_text, &diffs, message);
        let reply = match self.model.chat(ChatRequest::new(messages)).await {
            Ok(response) => response.text,
            Err(err) => return Err(err),
        };

        let snapshot = serde_json::to_value(&diffs).ok();
        let turns = entry.chats.entry(clause_id.to_string()).or_default();
        turns.push(ChatTurn {
            role: "user".to_string(),
            content: message.to_string(),
            suggestion_snapshot: None,
            timestamp: Utc::now(),
        });
        turns.push(ChatTurn {
            role: "assistant".to_string(),
            content: reply.clone(),
            suggestion_snapshot: snapshot,
            timestamp: Utc::now(),
        });
        entry.last_access = Instant::now();
        self.persist_entry(&entry).await;
        Ok(reply)
    }

    pub async fn chat_history(&self, task_id: &str, clause_id: &str) -> Result<Vec<ChatTurn>> {
        let entry_arc = self
            .entry(task_id)
            .ok_or_else(|| ReviewError::NotFound(format!("task {task_id}")))?;
        let entry = entry_arc.lock().await;
        Ok(entry.chats.get(clause_id).cloned().unwrap_or_default())
    }

    /// Drop parked entries idle beyond `max_idle`. Returns how many were
    /// evicted; their sessions stay in the store for rehydration.
    pub async fn sweep_idle(&self, max_idle: Duration) -> usize {
        let candidates: Vec<(String, Arc<AsyncMutex<TaskEntry>>)> = {
            let active = self.active.lock();
            active.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
        };
        let mut evicted = 0;
        for (task_id, entry_arc) in candidates {
            let idle = {
                let entry = entry_arc.lock().await;
                !entry.is_running() && entry.last_access.elapsed() > max_idle
            };
            if idle {
                self.active.lock().remove(&task_id);
                self.events.remove(&task_id);
                evicted += 1;
                info!(%task_id, "idle task swept from memory");
            }
        }
        evicted
    }

    fn build_graph(&self, entry: &TaskEntry) -> ReviewGraph {
        let resources = Arc::new(SkillResources {
            primary: entry.trees.get(&DocumentRole::Primary).cloned(),
            baseline: entry.trees.get(&DocumentRole::Baseline).cloned(),
            reference: entry
                .trees
                .get(&DocumentRole::Reference)
                .cloned()
                .into_iter()
                .collect(),
        });
        let dispatcher = SkillDispatcher::new(self.skills.clone(), resources);
        let tree = entry
            .trees
            .get(&DocumentRole::Primary)
            .cloned()
            .unwrap_or_else(|| Arc::new(empty_tree()));
        let sink = RunnerCheckpointSink {
            sessions: self.sessions.clone(),
            task_id: entry.task_id.clone(),
            user_id: entry.user_id.clone(),
            domain_id: entry.domain_id.clone(),
            extra: json!({
                "documents": entry.documents,
                "chats": entry.chats,
                "our_party": entry.our_party,
            }),
        };
        ReviewGraph::new(
            self.model.clone(),
            Arc::new(dispatcher),
            self.events.clone() as Arc<dyn EventSink>,
            Arc::new(sink),
            tree,
            GraphConfig {
                our_party: entry.our_party.clone(),
                ..GraphConfig::default()
            },
        )
    }

    async fn spawn_run(&self, entry_arc: Arc<AsyncMutex<TaskEntry>>) -> Result<()> {
        let (graph, mut state, cancel_rx, task_id, user_id) = {
            let mut entry = entry_arc.lock().await;
            let state = entry
                .state
                .take()
                .ok_or_else(|| ReviewError::Conflict("review is already running".to_string()))?;
            entry.status = TaskStatus::Reviewing;
            let (cancel, rx) = watch::channel(false);
            entry.cancel = cancel;
            (
                self.build_graph(&entry),
                state,
                rx,
                entry.task_id.clone(),
                entry.user_id.clone(),
            )
        };

        let events = self.events.clone();
        let quota = self.quota.clone();
        let entry_for_task = entry_arc.clone();
        tokio::spawn(async move {
            let outcome = graph.run(&mut state, &cancel_rx).await;
            let mut entry = entry_for_task.lock().await;
            match outcome {
                Ok(RunOutcome::Suspended) => {
                    entry.status = TaskStatus::AwaitingApproval;
                }
                Ok(RunOutcome::Completed) => {
                    entry.status = TaskStatus::Completed;
                    quota.deduct_for_completed(&user_id, &task_id).await;
                    events.emit(ReviewEvent::Done { task_id: task_id.clone() });
                }
                Ok(RunOutcome::Failed(reason)) => {
                    warn!(%task_id, %reason, "review run failed");
                    entry.status = TaskStatus::Failed;
                    events.emit(ReviewEvent::Done { task_id: task_id.clone() });
                }
                Err(err) => {
                    warn!(%task_id, %err, "review run errored");
                    entry.status = TaskStatus::Failed;
                    events.emit(ReviewEvent::Done { task_id: task_id.clone() });
                }
            }
            entry.last_access = Instant::now();
            entry.state = Some(state);
        });
        Ok(())
    }

    async fn persist_entry(&self, entry: &TaskEntry) {
        let Some(state) = &entry.state else { return };
        let graph = match state.to_json() {
            Ok(graph) => graph,
            Err(err) => {
                warn!(task_id = %entry.task_id, %err, "graph state not serializable");
                return;
            }
        };
        let wrapper = json!({
            "graph": graph,
            "documents": entry.documents,
            "chats": entry.chats,
            "our_party": entry.our_party,
        });
        self.sessions
            .save(
                &entry.task_id,
                &entry.user_id,
                &entry.domain_id,
                entry.status.as_str(),
                state.is_complete,
                wrapper,
            )
            .await;
    }
}

fn empty_tree() -> ClauseTree {
    ClauseTree {
        clauses: Vec::new(),
        total_clauses: 0,
        structure_type: "empty".to_string(),
        cross_references: Vec::new(),
        definitions: Vec::new(),
    }
}

fn view_from_state(task_id: &str, status: TaskStatus, state: &GraphState) -> StatusView {
    StatusView {
        task_id: task_id.to_string(),
        status: status.as_str().to_string(),
        current_clause_index: state.current_clause_index,
        total_clauses: state.checklist.len(),
        findings: state.findings.len(),
        risks: state.findings.values().map(|f| f.risks.len()).sum(),
        pending_diffs: state.pending_diffs.len(),
        is_complete: state.is_complete,
    }
}

fn view_from_value(task_id: &str, status: TaskStatus, graph: &Value) -> StatusView {
    StatusView {
        task_id: task_id.to_string(),
        status: status.as_str().to_string(),
        current_clause_index: graph["current_clause_index"].as_u64().unwrap_or(0) as usize,
        total_clauses: graph["checklist"].as_array().map(|a| a.len()).unwrap_or(0),
        findings: graph["findings"].as_object().map(|o| o.len()).unwrap_or(0),
        risks: graph["findings"]
            .as_object()
            .map(|o| {
                o.values()
                    .filter_map(|f| f["risks"].as_array())
                    .map(|a| a.len())
                    .sum()
            })
            .unwrap_or(0),
        pending_diffs: graph["pending_diffs"].as_array().map(|a| a.len()).unwrap_or(0),
        is_complete: graph["is_complete"].as_bool().unwrap_or(false),
    }
}
