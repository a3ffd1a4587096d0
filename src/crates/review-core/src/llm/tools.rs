//! Provider-neutral tool schema.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Description of a callable tool in the shape every provider understands:
/// a name, a description, and a JSON-Schema object for the parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// `{type: "object", properties: {...}, required: [...]}`
    pub parameters: Value,
}

impl ToolDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    /// A tool that takes no arguments.
    pub fn no_args(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(
            name,
            description,
            json!({"type": "object", "properties": {}, "required": []}),
        )
    }

    /// Render in the OpenAI-compatible `function` envelope used by DeepSeek.
    pub fn to_openai(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }

    /// Render as a Gemini function declaration.
    pub fn to_gemini(&self) -> Value {
        json!({
            "name": self.name,
            "description": self.description,
            "parameters": self.parameters,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openai_envelope() {
        let tool = ToolDefinition::new(
            "get_clause_context",
            "Fetch a clause and its neighbors",
            json!({
                "type": "object",
                "properties": {"clause_id": {"type": "string"}},
                "required": ["clause_id"]
            }),
        );
        let rendered = tool.to_openai();
        assert_eq!(rendered["type"], "function");
        assert_eq!(rendered["function"]["name"], "get_clause_context");
        assert_eq!(
            rendered["function"]["parameters"]["required"][0],
            "clause_id"
        );
    }

    #[test]
    fn gemini_declaration_is_flat() {
        let tool = ToolDefinition::no_args("list_definitions", "List defined terms");
        let rendered = tool.to_gemini();
        assert_eq!(rendered["name"], "list_definitions");
        assert!(rendered.get("function").is_none());
    }
}
