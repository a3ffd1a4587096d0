//! Data model: tasks, checklists, risks, diffs, findings, and graph state.

use crate::error::{ReviewError, Result};
use crate::graph::ReviewNode;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Lifecycle status of a review task. Transitions follow a DAG:
/// created → ready → reviewing ↔ awaiting_approval → completed | failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Created,
    Ready,
    Reviewing,
    AwaitingApproval,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Created => "created",
            TaskStatus::Ready => "ready",
            TaskStatus::Reviewing => "reviewing",
            TaskStatus::AwaitingApproval => "awaiting_approval",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created" => Some(TaskStatus::Created),
            "ready" => Some(TaskStatus::Ready),
            "reviewing" => Some(TaskStatus::Reviewing),
            "awaiting_approval" => Some(TaskStatus::AwaitingApproval),
            "completed" => Some(TaskStatus::Completed),
            "failed" => Some(TaskStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Whether moving to `next` is a legal lifecycle transition.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        if *self == next {
            return true;
        }
        match (*self, next) {
            (_, Failed) => !self.is_terminal(),
            (Created, Ready) | (Created, Reviewing) => true,
            (Ready, Reviewing) => true,
            (Reviewing, AwaitingApproval) | (AwaitingApproval, Reviewing) => true,
            (Reviewing, Completed) => true,
            _ => false,
        }
    }
}

/// Role of an uploaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentRole {
    Primary,
    Baseline,
    Reference,
}

impl DocumentRole {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "primary" => Some(DocumentRole::Primary),
            "baseline" => Some(DocumentRole::Baseline),
            "reference" => Some(DocumentRole::Reference),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentRole::Primary => "primary",
            DocumentRole::Baseline => "baseline",
            DocumentRole::Reference => "reference",
        }
    }
}

/// Review priority of a checklist item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

/// One clause a domain plugin wants reviewed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub clause_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub priority: Priority,
    /// Skills the agent loop must expose for this clause.
    #[serde(default)]
    pub required_skills: Vec<String>,
    /// Advisory extras, exposed but not mandated.
    #[serde(default)]
    pub suggested_skills: Vec<String>,
}

/// Severity of a risk point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    High,
    Medium,
    Low,
}

/// One risk the agent found in a clause.
///
/// Deserialization is tolerant: model output varies, so unknown fields are
/// ignored and a missing level defaults to medium.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskPoint {
    #[serde(default = "default_risk_level", alias = "level")]
    pub risk_level: RiskLevel,
    #[serde(default, alias = "type")]
    pub risk_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "rationale")]
    pub reason: String,
    #[serde(default)]
    pub original_text: String,
}

fn default_risk_level() -> RiskLevel {
    RiskLevel::Medium
}

/// Action kind of a proposed textual change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffAction {
    Replace,
    Insert,
    Delete,
}

/// Approval state of a diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffStatus {
    Pending,
    Approved,
    Rejected,
}

/// A proposed textual change to a clause, subject to human approval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentDiff {
    pub diff_id: String,
    pub clause_id: String,
    pub action: DiffAction,
    #[serde(default)]
    pub original_text: Option<String>,
    #[serde(default)]
    pub proposed_text: Option<String>,
    #[serde(default)]
    pub reason: String,
    pub risk_level: RiskLevel,
    pub status: DiffStatus,
}

impl DocumentDiff {
    /// Build a diff, enforcing the action/text invariants:
    /// `replace` needs both texts, `insert` the proposed, `delete` the
    /// original.
    pub fn new(
        clause_id: impl Into<String>,
        action: DiffAction,
        original_text: Option<String>,
        proposed_text: Option<String>,
        reason: impl Into<String>,
        risk_level: RiskLevel,
    ) -> Result<Self> {
        let valid = match action {
            DiffAction::Replace => original_text.is_some() && proposed_text.is_some(),
            DiffAction::Insert => proposed_text.is_some(),
            DiffAction::Delete => original_text.is_some(),
        };
        if !valid {
            return Err(ReviewError::Validation(format!(
                "diff action {action:?} is missing its required text"
            )));
        }
        Ok(Self {
            diff_id: Uuid::new_v4().to_string(),
            clause_id: clause_id.into(),
            action,
            original_text,
            proposed_text,
            reason: reason.into(),
            risk_level,
            status: DiffStatus::Pending,
        })
    }

    /// Dedupe key for diffs proposed within one clause.
    pub fn dedupe_key(&self) -> (DiffAction, Option<&str>) {
        (self.action, self.original_text.as_deref())
    }
}

/// A user's verdict on one diff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
}

/// Everything the review produced for one clause. Written once per pass
/// through the clause subgraph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClauseFindings {
    pub clause_id: String,
    #[serde(default)]
    pub risks: Vec<RiskPoint>,
    #[serde(default)]
    pub diffs: Vec<DocumentDiff>,
    /// Outputs of the skills the agent ran, keyed by skill id.
    #[serde(default)]
    pub skill_context: BTreeMap<String, Value>,
}

/// Serialized schema version of [`GraphState`]. Bump when the layout
/// changes incompatibly.
pub const GRAPH_STATE_VERSION: u32 = 1;

/// The full state of one review run. Serialized as tagged, versioned JSON
/// and checkpointed after every node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphState {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub task_id: String,
    pub domain_id: String,
    #[serde(default)]
    pub language: String,
    /// Where the state machine will continue.
    pub node: ReviewNode,
    pub checklist: Vec<ChecklistItem>,
    /// Only ever increases.
    pub current_clause_index: usize,
    /// Context text resolved for the clause under review.
    #[serde(default)]
    pub current_clause_text: String,
    #[serde(default)]
    pub current_risks: Vec<RiskPoint>,
    #[serde(default)]
    pub current_diffs: Vec<DocumentDiff>,
    /// Skill outputs accumulated for the clause under review.
    #[serde(default)]
    pub skill_context: BTreeMap<String, Value>,
    pub findings: BTreeMap<String, ClauseFindings>,
    #[serde(default)]
    pub pending_diffs: Vec<DocumentDiff>,
    #[serde(default)]
    pub user_decisions: BTreeMap<String, Decision>,
    #[serde(default)]
    pub user_feedback: BTreeMap<String, String>,
    #[serde(default)]
    pub summary_notes: String,
    #[serde(default)]
    pub is_complete: bool,
    /// Diff regeneration rounds consumed for the clause under review.
    #[serde(default)]
    pub regeneration_round: u32,
}

fn default_schema_version() -> u32 {
    GRAPH_STATE_VERSION
}

impl GraphState {
    pub fn new(
        task_id: impl Into<String>,
        domain_id: impl Into<String>,
        language: impl Into<String>,
        checklist: Vec<ChecklistItem>,
    ) -> Self {
        Self {
            schema_version: GRAPH_STATE_VERSION,
            task_id: task_id.into(),
            domain_id: domain_id.into(),
            language: language.into(),
            node: ReviewNode::Init,
            checklist,
            current_clause_index: 0,
            current_clause_text: String::new(),
            current_risks: Vec::new(),
            current_diffs: Vec::new(),
            skill_context: BTreeMap::new(),
            findings: BTreeMap::new(),
            pending_diffs: Vec::new(),
            user_decisions: BTreeMap::new(),
            user_feedback: BTreeMap::new(),
            summary_notes: String::new(),
            is_complete: false,
            regeneration_round: 0,
        }
    }

    /// The checklist item under review, if any remain.
    pub fn current_item(&self) -> Option<&ChecklistItem> {
        self.checklist.get(self.current_clause_index)
    }

    /// Diff ids pending approval that have no decision yet.
    pub fn missing_decisions(&self) -> Vec<String> {
        let mut missing: Vec<String> = self
            .pending_diffs
            .iter()
            .filter(|d| !self.user_decisions.contains_key(&d.diff_id))
            .map(|d| d.diff_id.clone())
            .collect();
        missing.sort();
        missing
    }

    pub fn to_json(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    pub fn from_json(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }
}
