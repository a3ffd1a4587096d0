//! The review graph: a finite state machine over the checklist.
//!
//! The graph is an explicit tagged union of nodes plus a `step` function;
//! there is no hidden control flow. The runner drives steps until the
//! state machine either completes, fails, or suspends at the human
//! approval interrupt, checkpointing through the injected sink after every
//! node. Suspension is a distinguished outcome the caller observes, not an
//! exception.

use crate::error::{ReviewError, Result};
use crate::events::{EventSink, ReviewEvent};
use crate::llm::{ChatModel, ChatRequest};
use crate::prompts;
use crate::react::{
    self, react_agent_loop, AgentContext, SkillExecutor, SkillInvocation,
};
use crate::state::{
    ClauseFindings, Decision, DiffAction, DiffStatus, DocumentDiff, GraphState, RiskLevel,
    RiskPoint, TaskStatus,
};
use async_trait::async_trait;
use parser::ClauseTree;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Nodes of the review state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewNode {
    Init,
    SelectClause,
    ClauseContext,
    ClauseAnalyze,
    ClauseGenerateDiffs,
    ClauseValidate,
    HumanApproval,
    SaveClause,
    Summarize,
    Complete,
    Failed,
}

/// How a `run` ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Halted at the approval interrupt; resume after decisions arrive.
    Suspended,
    Completed,
    Failed(String),
}

/// Where the runner writes checkpoints. Implementations must swallow their
/// own persistence failures: a failed write is logged, never propagated.
#[async_trait]
pub trait CheckpointSink: Send + Sync {
    async fn checkpoint(&self, state: &GraphState, status: TaskStatus);
}

/// Sink that persists nothing.
#[derive(Default)]
pub struct NullCheckpoint;

#[async_trait]
impl CheckpointSink for NullCheckpoint {
    async fn checkpoint(&self, _state: &GraphState, _status: TaskStatus) {}
}

/// Tunables for one graph instance.
#[derive(Debug, Clone)]
pub struct GraphConfig {
    /// Party the review is conducted for, injected into prompts.
    pub our_party: String,
    /// Reason-act iterations per clause.
    pub max_iterations: usize,
    /// Diff regeneration rounds allowed after full rejection.
    pub max_regeneration_rounds: u32,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            our_party: String::new(),
            max_iterations: react::DEFAULT_MAX_ITERATIONS,
            max_regeneration_rounds: 2,
        }
    }
}

enum Flow {
    Continue,
    Suspend,
    Done,
}

/// Pure routing decision after an approval round.
///
/// All rejected → regenerate diffs; anything else, including an empty
/// decision set, proceeds to saving the clause.
pub fn route_after_approval(state: &GraphState) -> ReviewNode {
    if state.pending_diffs.is_empty() || state.user_decisions.is_empty() {
        return ReviewNode::SaveClause;
    }
    let all_rejected = state.pending_diffs.iter().all(|d| {
        matches!(state.user_decisions.get(&d.diff_id), Some(Decision::Reject))
    });
    if all_rejected {
        ReviewNode::ClauseGenerateDiffs
    } else {
        ReviewNode::SaveClause
    }
}

/// The graph runner for one task.
pub struct ReviewGraph {
    model: Arc<dyn ChatModel>,
    skills: Arc<dyn SkillExecutor>,
    events: Arc<dyn EventSink>,
    checkpoints: Arc<dyn CheckpointSink>,
    tree: Arc<ClauseTree>,
    config: GraphConfig,
}

impl ReviewGraph {
    pub fn new(
        model: Arc<dyn ChatModel>,
        skills: Arc<dyn SkillExecutor>,
        events: Arc<dyn EventSink>,
        checkpoints: Arc<dyn CheckpointSink>,
        tree: Arc<ClauseTree>,
        config: GraphConfig,
    ) -> Self {
        Self {
            model,
            skills,
            events,
            checkpoints,
            tree,
            config,
        }
    }

    /// Drive the state machine until it completes, fails, or suspends.
    /// Cancellation takes effect at the next checkpoint boundary.
    pub async fn run(
        &self,
        state: &mut GraphState,
        cancel: &watch::Receiver<bool>,
    ) -> Result<RunOutcome> {
        loop {
            if *cancel.borrow() {
                return self.fail(state, ReviewError::Cancelled).await;
            }

            let flow = match self.step(state, cancel).await {
                Ok(flow) => flow,
                Err(err) => return self.fail(state, err).await,
            };

            match flow {
                Flow::Continue => {
                    let status = if state.node == ReviewNode::Complete {
                        TaskStatus::Completed
                    } else {
                        TaskStatus::Reviewing
                    };
                    self.checkpoints.checkpoint(state, status).await;
                }
                Flow::Suspend => {
                    self.checkpoints
                        .checkpoint(state, TaskStatus::AwaitingApproval)
                        .await;
                    return Ok(RunOutcome::Suspended);
                }
                Flow::Done => {
                    return Ok(match state.node {
                        ReviewNode::Failed => RunOutcome::Failed(
                            "task moved to failed".to_string(),
                        ),
                        _ => RunOutcome::Completed,
                    });
                }
            }
        }
    }

    async fn fail(&self, state: &mut GraphState, err: ReviewError) -> Result<RunOutcome> {
        warn!(task_id = %state.task_id, %err, "review failed");
        state.node = ReviewNode::Failed;
        self.events.emit(ReviewEvent::Error {
            task_id: state.task_id.clone(),
            kind: err.kind().to_string(),
            message: err.to_string(),
        });
        self.checkpoints.checkpoint(state, TaskStatus::Failed).await;
        Ok(RunOutcome::Failed(err.to_string()))
    }

    /// Validate decisions and reposition the state machine after an
    /// approval round. Callers invoke [`ReviewGraph::run`] afterwards.
    pub fn prepare_resume(&self, state: &mut GraphState) -> Result<()> {
        if state.node != ReviewNode::HumanApproval {
            return Err(ReviewError::Conflict(format!(
                "task {} is not awaiting approval",
                state.task_id
            )));
        }
        let missing = state.missing_decisions();
        if !missing.is_empty() {
            return Err(ReviewError::DecisionsIncomplete { missing });
        }

        for diff in &mut state.pending_diffs {
            match state.user_decisions.get(&diff.diff_id) {
                Some(Decision::Approve) => diff.status = DiffStatus::Approved,
                Some(Decision::Reject) => diff.status = DiffStatus::Rejected,
                None => {}
            }
        }

        match route_after_approval(state) {
            ReviewNode::ClauseGenerateDiffs => {
                state.regeneration_round += 1;
                if state.regeneration_round > self.config.max_regeneration_rounds {
                    let clause_id = state
                        .current_item()
                        .map(|i| i.clause_id.clone())
                        .unwrap_or_default();
                    self.events.emit(ReviewEvent::Error {
                        task_id: state.task_id.clone(),
                        kind: "regeneration_exhausted".to_string(),
                        message: format!(
                            "clause {clause_id}: regeneration rounds exhausted, keeping rejections"
                        ),
                    });
                    state.current_diffs = std::mem::take(&mut state.pending_diffs);
                    state.node = ReviewNode::SaveClause;
                } else {
                    info!(
                        task_id = %state.task_id,
                        round = state.regeneration_round,
                        "all diffs rejected, regenerating"
                    );
                    state.pending_diffs.clear();
                    state.current_diffs.clear();
                    state.node = ReviewNode::ClauseGenerateDiffs;
                }
            }
            _ => {
                state.current_diffs = std::mem::take(&mut state.pending_diffs);
                state.node = ReviewNode::SaveClause;
            }
        }
        Ok(())
    }

    async fn step(&self, state: &mut GraphState, cancel: &watch::Receiver<bool>) -> Result<Flow> {
        debug!(task_id = %state.task_id, node = ?state.node, "step");
        match state.node {
            ReviewNode::Init => {
                self.events.emit(ReviewEvent::ReviewStarted {
                    task_id: state.task_id.clone(),
                    total_clauses: state.checklist.len(),
                });
                state.node = ReviewNode::SelectClause;
                Ok(Flow::Continue)
            }

            ReviewNode::SelectClause => {
                if state.current_clause_index >= state.checklist.len() {
                    state.node = ReviewNode::Summarize;
                } else {
                    self.events.emit(ReviewEvent::ReviewProgress {
                        task_id: state.task_id.clone(),
                        current_clause_index: state.current_clause_index,
                        total: state.checklist.len(),
                    });
                    state.node = ReviewNode::ClauseContext;
                }
                Ok(Flow::Continue)
            }

            ReviewNode::ClauseContext => {
                let (clause_id, fallback) = {
                    let item = state
                        .current_item()
                        .ok_or_else(|| ReviewError::Internal("clause index out of range".into()))?;
                    (item.clause_id.clone(), item.description.clone())
                };
                state.current_clause_text = self
                    .resolve_clause_context(&clause_id)
                    .unwrap_or(fallback);
                state.node = ReviewNode::ClauseAnalyze;
                Ok(Flow::Continue)
            }

            ReviewNode::ClauseAnalyze => {
                let item = state
                    .current_item()
                    .ok_or_else(|| ReviewError::Internal("clause index out of range".into()))?
                    .clone();
                let transcript = prompts::build_react_agent_messages(
                    &self.config.our_party,
                    &state.language,
                    &item,
                    &state.current_clause_text,
                );
                let mut allowed: Vec<String> = item.required_skills.clone();
                allowed.extend(item.suggested_skills.iter().cloned());

                let ctx = AgentContext {
                    invocation: SkillInvocation {
                        task_id: state.task_id.clone(),
                        clause_id: item.clause_id.clone(),
                        domain_id: state.domain_id.clone(),
                        language: state.language.clone(),
                    },
                    events: self.events.as_ref(),
                    cancel: Some(cancel),
                };
                let outcome = react_agent_loop(
                    self.model.as_ref(),
                    self.skills.as_ref(),
                    transcript,
                    &ctx,
                    &allowed,
                    self.config.max_iterations,
                )
                .await?;

                state.current_risks = outcome.risks;
                state.skill_context.extend(outcome.skill_context);
                state.node = ReviewNode::ClauseGenerateDiffs;
                Ok(Flow::Continue)
            }

            ReviewNode::ClauseGenerateDiffs => {
                let item = state
                    .current_item()
                    .ok_or_else(|| ReviewError::Internal("clause index out of range".into()))?
                    .clone();
                state.current_diffs = self
                    .generate_diffs(state, &item.clause_id)
                    .await?;
                state.node = ReviewNode::ClauseValidate;
                Ok(Flow::Continue)
            }

            ReviewNode::ClauseValidate => {
                let clause_text = state.current_clause_text.clone();
                state.current_diffs.retain(|diff| {
                    let valid = diff_is_valid(diff, &clause_text);
                    if !valid {
                        warn!(
                            task_id = %state.task_id,
                            diff_id = %diff.diff_id,
                            "dropping diff whose original text is not in the clause"
                        );
                    }
                    valid
                });
                state.node = if state.current_diffs.is_empty() {
                    ReviewNode::SaveClause
                } else {
                    ReviewNode::HumanApproval
                };
                Ok(Flow::Continue)
            }

            ReviewNode::HumanApproval => {
                let clause_id = state
                    .current_item()
                    .map(|i| i.clause_id.clone())
                    .unwrap_or_default();
                state.pending_diffs = state.current_diffs.clone();
                state.user_decisions.clear();
                state.user_feedback.clear();
                self.events.emit(ReviewEvent::ApprovalRequired {
                    task_id: state.task_id.clone(),
                    clause_id,
                    pending_diffs: state.pending_diffs.clone(),
                });
                Ok(Flow::Suspend)
            }

            ReviewNode::SaveClause => {
                let item = state
                    .current_item()
                    .ok_or_else(|| ReviewError::Internal("clause index out of range".into()))?
                    .clone();
                for diff in state
                    .current_diffs
                    .iter()
                    .filter(|d| d.status == DiffStatus::Approved)
                {
                    self.events.emit(ReviewEvent::DocUpdate {
                        task_id: state.task_id.clone(),
                        clause_id: item.clause_id.clone(),
                        diff: diff.clone(),
                    });
                }
                let findings = ClauseFindings {
                    clause_id: item.clause_id.clone(),
                    risks: std::mem::take(&mut state.current_risks),
                    diffs: std::mem::take(&mut state.current_diffs),
                    skill_context: std::mem::take(&mut state.skill_context),
                };
                state.findings.insert(item.clause_id.clone(), findings);
                state.pending_diffs.clear();
                state.user_decisions.clear();
                state.user_feedback.clear();
                state.current_clause_text.clear();
                state.regeneration_round = 0;
                state.current_clause_index += 1;
                state.node = ReviewNode::SelectClause;
                Ok(Flow::Continue)
            }

            ReviewNode::Summarize => {
                let total_risks: usize = state.findings.values().map(|f| f.risks.len()).sum();
                let approved: usize = state
                    .findings
                    .values()
                    .flat_map(|f| f.diffs.iter())
                    .filter(|d| d.status == DiffStatus::Approved)
                    .count();
                state.summary_notes = self.summarize(state, total_risks, approved).await;
                state.is_complete = true;
                self.events.emit(ReviewEvent::ReviewCompleted {
                    task_id: state.task_id.clone(),
                    total_risks,
                    approved_diffs: approved,
                    summary: state.summary_notes.clone(),
                });
                state.node = ReviewNode::Complete;
                Ok(Flow::Continue)
            }

            ReviewNode::Complete | ReviewNode::Failed => Ok(Flow::Done),
        }
    }

    /// Clause text plus immediate structure, resolved from the parsed tree.
    fn resolve_clause_context(&self, clause_id: &str) -> Option<String> {
        let node = self.tree.find(clause_id)?;
        let mut out = format!("{} {}\n{}", node.clause_id, node.title, node.text);
        if !node.children.is_empty() {
            out.push_str("\nSub-clauses:");
            for child in &node.children {
                out.push_str(&format!("\n  {} {}", child.clause_id, child.title));
            }
        }
        Some(out)
    }

    /// Ask the model for diffs covering the high and medium risks, then
    /// dedupe by (action, original_text). Model failure yields no diffs;
    /// only fatal errors propagate.
    async fn generate_diffs(
        &self,
        state: &GraphState,
        clause_id: &str,
    ) -> Result<Vec<DocumentDiff>> {
        let eligible: Vec<RiskPoint> = state
            .current_risks
            .iter()
            .filter(|r| matches!(r.risk_level, RiskLevel::High | RiskLevel::Medium))
            .cloned()
            .collect();
        if eligible.is_empty() {
            return Ok(Vec::new());
        }

        let messages =
            prompts::build_generate_diffs_messages(clause_id, &state.current_clause_text, &eligible);
        let response = match self.model.chat(ChatRequest::new(messages)).await {
            Ok(response) => response,
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                warn!(%err, "diff generation failed, proposing nothing");
                return Ok(Vec::new());
            }
        };

        let mut seen: HashSet<(DiffAction, Option<String>)> = HashSet::new();
        let mut diffs = Vec::new();
        for spec in react::parse_object_array(&response.text) {
            let Some(diff) = diff_from_spec(clause_id, &spec) else {
                continue;
            };
            let key = (diff.action, diff.original_text.clone());
            if !seen.insert(key) {
                continue;
            }
            self.events.emit(ReviewEvent::DiffProposed {
                task_id: state.task_id.clone(),
                clause_id: clause_id.to_string(),
                diff: diff.clone(),
            });
            diffs.push(diff);
        }
        Ok(diffs)
    }

    async fn summarize(&self, state: &GraphState, total_risks: usize, approved: usize) -> String {
        let detail: String = state
            .findings
            .values()
            .map(|f| {
                format!(
                    "{}: {} risks, {} changes\n",
                    f.clause_id,
                    f.risks.len(),
                    f.diffs.len()
                )
            })
            .collect();
        let base = format!(
            "Review complete: {} clauses, {} risks, {} approved changes.",
            state.findings.len(),
            total_risks,
            approved
        );
        let messages =
            prompts::build_summarize_messages(state.findings.len(), total_risks, approved, &detail);
        match self.model.chat(ChatRequest::new(messages)).await {
            Ok(response) if !response.text.trim().is_empty() => {
                format!("{base}\n{}", response.text.trim())
            }
            Ok(_) => base,
            Err(err) => {
                warn!(%err, "summary generation failed, using the deterministic summary");
                base
            }
        }
    }
}

fn diff_is_valid(diff: &DocumentDiff, clause_text: &str) -> bool {
    match diff.action {
        DiffAction::Replace | DiffAction::Delete => diff
            .original_text
            .as_deref()
            .map(|t| clause_text.contains(t))
            .unwrap_or(false),
        DiffAction::Insert => diff.proposed_text.is_some(),
    }
}

fn diff_from_spec(clause_id: &str, spec: &serde_json::Value) -> Option<DocumentDiff> {
    let action = match spec.get("action").and_then(serde_json::Value::as_str)? {
        "replace" => DiffAction::Replace,
        "insert" => DiffAction::Insert,
        "delete" => DiffAction::Delete,
        other => {
            warn!(action = other, "unknown diff action from model, skipping");
            return None;
        }
    };
    let text = |key: &str| {
        spec.get(key)
            .and_then(serde_json::Value::as_str)
            .map(String::from)
    };
    let risk_level = spec
        .get("risk_level")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .unwrap_or(RiskLevel::Medium);
    DocumentDiff::new(
        clause_id,
        action,
        text("original_text"),
        text("proposed_text"),
        text("reason").unwrap_or_default(),
        risk_level,
    )
    .map_err(|err| warn!(%err, "model proposed an invalid diff, skipping"))
    .ok()
}
