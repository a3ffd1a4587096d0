//! Core engine for the contract-review orchestrator.
//!
//! This crate holds the pieces the rest of the workspace is built around:
//!
//! - the data model for tasks, checklists, risks, diffs, and graph state
//!   ([`state`])
//! - the provider-agnostic chat model interface ([`llm`])
//! - the per-clause ReAct agent loop ([`react`])
//! - the incremental JSON stream parser for model output ([`stream`])
//! - the review graph state machine and runner ([`graph`])
//! - the event taxonomy pushed to clients ([`events`])
//!
//! The engine is deliberately not a general workflow platform: the graph
//! topology is fixed to the clause-review loop, with one interrupt point at
//! human approval.

pub mod error;
pub mod events;
pub mod graph;
pub mod llm;
pub mod messages;
pub mod prompts;
pub mod react;
pub mod state;
pub mod stream;

pub use error::{ReviewError, Result};
pub use events::{EventSink, NullSink, ReviewEvent, VecSink};
pub use graph::{CheckpointSink, GraphConfig, ReviewGraph, ReviewNode, RunOutcome};
pub use llm::{ChatModel, ChatOptions, ChatRequest, ChatResponse, ChatStream, ToolDefinition};
pub use messages::{Message, MessageRole, ToolCall};
pub use react::{
    react_agent_loop, AgentContext, AgentOutcome, SkillExecutor, SkillInvocation, SkillResult,
};
pub use state::{
    ChecklistItem, ClauseFindings, Decision, DiffAction, DiffStatus, DocumentDiff, DocumentRole,
    GraphState, Priority, RiskLevel, RiskPoint, TaskStatus,
};
pub use stream::{FinalParse, RiskStreamParser};
