//! Chat message types shared by the agent loop and the model adapters.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Role of a message in a chat transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned call id, echoed back in the tool message.
    pub id: String,
    /// Skill id the model wants to invoke.
    pub name: String,
    /// Raw argument string as produced by the model. Parsed defensively by
    /// the agent loop; malformed JSON becomes a tool error message, not a
    /// crash.
    pub arguments: String,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// Parse the argument string as a JSON object.
    pub fn parse_arguments(&self) -> Result<Value, serde_json::Error> {
        if self.arguments.trim().is_empty() {
            return Ok(Value::Object(serde_json::Map::new()));
        }
        serde_json::from_str(&self.arguments)
    }
}

/// One message in a chat transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    /// Tool calls attached to an assistant message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// For tool messages: the id of the call this responds to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Tool,
            content: content.into(),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    pub fn with_tool_calls(mut self, calls: Vec<ToolCall>) -> Self {
        self.tool_calls = Some(calls);
        self
    }

    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls.as_ref().map(|c| !c.is_empty()).unwrap_or(false)
    }

    pub fn is_assistant(&self) -> bool {
        self.role == MessageRole::Assistant
    }

    pub fn is_tool(&self) -> bool {
        self.role == MessageRole::Tool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_set_roles() {
        assert_eq!(Message::system("s").role, MessageRole::System);
        assert_eq!(Message::user("u").role, MessageRole::User);
        assert!(Message::assistant("a").is_assistant());
        let tool = Message::tool("c1", "result");
        assert!(tool.is_tool());
        assert_eq!(tool.tool_call_id.as_deref(), Some("c1"));
    }

    #[test]
    fn tool_call_argument_parsing() {
        let call = ToolCall::new("c1", "get_clause_context", r#"{"clause_id":"1.1"}"#);
        let args = call.parse_arguments().unwrap();
        assert_eq!(args["clause_id"], "1.1");

        let empty = ToolCall::new("c2", "x", "");
        assert!(empty.parse_arguments().unwrap().as_object().unwrap().is_empty());

        let bad = ToolCall::new("c3", "x", "{not json");
        assert!(bad.parse_arguments().is_err());
    }

    #[test]
    fn has_tool_calls() {
        let msg = Message::assistant("").with_tool_calls(vec![ToolCall::new("c1", "a", "{}")]);
        assert!(msg.has_tool_calls());
        assert!(!Message::assistant("plain").has_tool_calls());
        let empty = Message::assistant("").with_tool_calls(vec![]);
        assert!(!empty.has_tool_calls());
    }

    #[test]
    fn serde_roundtrip_skips_absent_fields() {
        let json = serde_json::to_string(&Message::user("hello")).unwrap();
        assert!(!json.contains("tool_calls"));
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back.content, "hello");
    }
}
