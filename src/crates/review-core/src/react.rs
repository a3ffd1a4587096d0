//! The per-clause ReAct agent loop.
//!
//! Alternates between model-proposed tool calls and skill execution until
//! the model produces a final list of risks or the iteration budget runs
//! out. Skill failures are reported back to the model as tool messages and
//! never abort the loop; a model failure ends the loop with whatever
//! skill context has accumulated. Only exhausted providers and broken
//! streams propagate as errors, because those fail the whole task.

use crate::error::{ReviewError, Result};
use crate::events::{EventSink, ReviewEvent};
use crate::llm::{ChatModel, ChatRequest};
use crate::messages::Message;
use crate::state::RiskPoint;
use crate::stream::RiskStreamParser;
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Maximum characters of a tool result reinserted into the transcript.
pub const MAX_TOOL_RESULT_CHARS: usize = 8000;

/// Default bound on reason-act iterations per clause.
pub const DEFAULT_MAX_ITERATIONS: usize = 3;

/// Uniform result of one skill invocation.
#[derive(Debug, Clone)]
pub struct SkillResult {
    pub skill_id: String,
    pub success: bool,
    pub data: Option<Value>,
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

impl SkillResult {
    pub fn ok(skill_id: impl Into<String>, data: Value, elapsed_ms: u64) -> Self {
        Self {
            skill_id: skill_id.into(),
            success: true,
            data: Some(data),
            error: None,
            elapsed_ms,
        }
    }

    pub fn err(skill_id: impl Into<String>, error: impl Into<String>, elapsed_ms: u64) -> Self {
        Self {
            skill_id: skill_id.into(),
            success: false,
            data: None,
            error: Some(error.into()),
            elapsed_ms,
        }
    }
}

/// Identifies the invocation a skill runs under.
#[derive(Debug, Clone)]
pub struct SkillInvocation {
    pub task_id: String,
    pub clause_id: String,
    pub domain_id: String,
    pub language: String,
}

/// The seam between the agent loop and the skill layer.
///
/// The dispatcher in the `skills` crate implements this; tests plug in
/// scripted fakes. A skill failure is returned as an unsuccessful
/// [`SkillResult`], never as an `Err`.
#[async_trait]
pub trait SkillExecutor: Send + Sync {
    /// Tool schemas visible for this clause: its required and suggested
    /// skills plus the default toolset, scoped to the domain.
    fn tool_definitions(&self, domain_id: &str, skill_ids: &[String]) -> Vec<crate::llm::ToolDefinition>;

    /// Run one skill.
    async fn dispatch(&self, skill_id: &str, input: Value, invocation: &SkillInvocation) -> SkillResult;
}

/// Ambient wiring for one loop run.
pub struct AgentContext<'a> {
    pub invocation: SkillInvocation,
    pub events: &'a dyn EventSink,
    pub cancel: Option<&'a watch::Receiver<bool>>,
}

impl AgentContext<'_> {
    fn is_cancelled(&self) -> bool {
        self.cancel.map(|c| *c.borrow()).unwrap_or(false)
    }
}

/// What the loop produced.
#[derive(Debug, Default)]
pub struct AgentOutcome {
    pub risks: Vec<RiskPoint>,
    pub skill_context: BTreeMap<String, Value>,
    pub transcript: Vec<Message>,
}

/// Run the reason-act loop for one clause.
pub async fn react_agent_loop(
    model: &dyn ChatModel,
    skills: &dyn SkillExecutor,
    mut transcript: Vec<Message>,
    ctx: &AgentContext<'_>,
    allowed_skills: &[String],
    max_iterations: usize,
) -> Result<AgentOutcome> {
    let tools = skills.tool_definitions(&ctx.invocation.domain_id, allowed_skills);
    let mut skill_context: BTreeMap<String, Value> = BTreeMap::new();
    let task_id = ctx.invocation.task_id.clone();
    let clause_id = ctx.invocation.clause_id.clone();

    // With no tools to offer there is nothing to iterate on: stream the
    // analysis straight through the incremental parser.
    if tools.is_empty() {
        let (risks, text) = stream_analysis(model, &transcript, ctx).await?;
        transcript.push(Message::assistant(text));
        return Ok(AgentOutcome { risks, skill_context, transcript });
    }

    let mut risks = Vec::new();
    for iteration in 0..max_iterations {
        if ctx.is_cancelled() {
            return Err(ReviewError::Cancelled);
        }

        let response = match model
            .chat_with_tools(ChatRequest::new(transcript.clone()), &tools)
            .await
        {
            Ok(response) => response,
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => {
                warn!(%err, clause_id = %clause_id, "model call failed, ending agent loop");
                break;
            }
        };

        if !response.has_tool_calls() {
            risks = parse_final_response(&response.text);
            transcript.push(Message::assistant(response.text));
            break;
        }

        let calls = response.tool_calls.clone();
        transcript.push(Message::assistant(response.text).with_tool_calls(calls.clone()));

        // All calls of a round execute in the order the model returned them.
        for call in &calls {
            ctx.events.emit(ReviewEvent::ToolCall {
                task_id: task_id.clone(),
                clause_id: clause_id.clone(),
                skill_id: call.name.clone(),
                args_digest: truncate(&call.arguments, 120),
            });

            let (content, success) = match call.parse_arguments() {
                Err(err) => (format!("error: tool arguments are not valid JSON: {err}"), false),
                Ok(args) => {
                    let result = skills.dispatch(&call.name, args, &ctx.invocation).await;
                    if result.success {
                        if let Some(data) = &result.data {
                            // Latest output wins per skill.
                            skill_context.insert(result.skill_id.clone(), data.clone());
                        }
                        (truncate(&serialize_tool_result(&result.data), MAX_TOOL_RESULT_CHARS), true)
                    } else {
                        let reason = result.error.unwrap_or_else(|| "unknown error".to_string());
                        (format!("error: skill {} failed: {reason}", call.name), false)
                    }
                }
            };

            ctx.events.emit(ReviewEvent::ToolResult {
                task_id: task_id.clone(),
                clause_id: clause_id.clone(),
                skill_id: call.name.clone(),
                success,
                summary: truncate(&content, 200),
            });
            transcript.push(Message::tool(call.id.clone(), content));
        }

        debug!(iteration, clause_id = %clause_id, "agent round complete");
    }

    Ok(AgentOutcome { risks, skill_context, transcript })
}

/// Stream a toolless analysis through the incremental parser, emitting
/// `message_delta` events as chunks arrive.
async fn stream_analysis(
    model: &dyn ChatModel,
    transcript: &[Message],
    ctx: &AgentContext<'_>,
) -> Result<(Vec<RiskPoint>, String)> {
    let mut stream = match model.chat_stream(ChatRequest::new(transcript.to_vec())).await {
        Ok(stream) => stream,
        Err(err) if err.is_fatal() => return Err(err),
        Err(err) => {
            warn!(%err, "streaming analysis unavailable, returning no findings");
            return Ok((Vec::new(), String::new()));
        }
    };

    let mut parser = RiskStreamParser::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        parser.feed(&chunk)?;
        ctx.events.emit(ReviewEvent::MessageDelta {
            task_id: ctx.invocation.task_id.clone(),
            clause_id: ctx.invocation.clause_id.clone(),
            delta: chunk,
        });
    }

    let final_parse = parser.finalize();
    if final_parse.reconciled {
        ctx.events.emit(ReviewEvent::Error {
            task_id: ctx.invocation.task_id.clone(),
            kind: "stream_reconciled".to_string(),
            message: "incremental parse disagreed with the full document; full parse used"
                .to_string(),
        });
    }

    let text = parser.buffer().to_string();
    let mut risks: Vec<RiskPoint> = final_parse
        .risks
        .iter()
        .filter(|v| v.is_object())
        .filter_map(|v| serde_json::from_value(v.clone()).ok())
        .collect();
    if risks.is_empty() {
        // The model may answer with a bare array instead of a document.
        risks = parse_final_response(&text);
    }
    Ok((risks, text))
}

/// Tolerantly parse the model's final answer as a list of risks. Code
/// fences are stripped, non-array answers mean zero findings, and
/// non-object array entries are dropped.
pub fn parse_final_response(text: &str) -> Vec<RiskPoint> {
    parse_object_array(text)
        .into_iter()
        .filter_map(|v| serde_json::from_value(v).ok())
        .collect()
}

pub(crate) fn parse_object_array(text: &str) -> Vec<Value> {
    let mut candidate = text.trim();
    if let Some(fence_start) = candidate.find("```") {
        let after = &candidate[fence_start + 3..];
        let after = after.strip_prefix("json").unwrap_or(after);
        candidate = match after.find("```") {
            Some(fence_end) => after[..fence_end].trim(),
            None => after.trim(),
        };
    }
    let candidate = match (candidate.find('['), candidate.rfind(']')) {
        (Some(start), Some(end)) if end > start => &candidate[start..=end],
        _ => return Vec::new(),
    };
    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Array(items)) => items.into_iter().filter(|v| v.is_object()).collect(),
        _ => Vec::new(),
    }
}

/// Serialize a skill output for the transcript.
pub fn serialize_tool_result(data: &Option<Value>) -> String {
    match data {
        None => "{}".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(value) => value.to_string(),
    }
}

/// Truncate on a char boundary, appending a marker when anything was cut.
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{cut}... (truncated)")
}
