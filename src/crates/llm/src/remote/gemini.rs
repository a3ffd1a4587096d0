//! Google Gemini client (generateContent wire format).
//!
//! Gemini separates system instructions from the conversation, names the
//! assistant role "model", and returns tool calls as `functionCall` parts
//! with structured arguments. Function-call parts are collected into one
//! atomic response; the adapter contract never exposes partial calls.

use crate::config::RemoteLlmConfig;
use crate::error::LlmError;
use crate::remote::deepseek::{classify_reqwest_error, classify_status};
use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use review_core::llm::{ChatModel, ChatRequest, ChatResponse, ChatStream, ToolDefinition};
use review_core::{Message, MessageRole, ReviewError, Result as CoreResult, ToolCall};
use reqwest::Client;
use serde_json::{json, Value};
use uuid::Uuid;

/// Gemini API client.
#[derive(Clone)]
pub struct GeminiClient {
    config: RemoteLlmConfig,
    client: Client,
}

impl GeminiClient {
    pub fn new(config: RemoteLlmConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("Failed to create HTTP client");
        Self { config, client }
    }

    /// Split system messages out and convert the rest to `contents`.
    fn convert_messages(messages: &[Message]) -> (Option<String>, Vec<Value>) {
        let mut system = None;
        let mut contents = Vec::new();
        for msg in messages {
            match msg.role {
                MessageRole::System => {
                    let text = msg.content.clone();
                    system = Some(match system {
                        Some(existing) => format!("{existing}\n\n{text}"),
                        None => text,
                    });
                }
                MessageRole::User => {
                    contents.push(json!({"role": "user", "parts": [{"text": msg.content}]}));
                }
                MessageRole::Assistant => {
                    let mut parts = Vec::new();
                    if !msg.content.is_empty() {
                        parts.push(json!({"text": msg.content}));
                    }
                    for call in msg.tool_calls.iter().flatten() {
                        let args: Value =
                            serde_json::from_str(&call.arguments).unwrap_or_else(|_| json!({}));
                        parts.push(json!({"functionCall": {"name": call.name, "args": args}}));
                    }
                    if parts.is_empty() {
                        parts.push(json!({"text": ""}));
                    }
                    contents.push(json!({"role": "model", "parts": parts}));
                }
                MessageRole::Tool => {
                    contents.push(json!({
                        "role": "user",
                        "parts": [{"functionResponse": {
                            "name": msg.tool_call_id.clone().unwrap_or_default(),
                            "response": {"content": msg.content},
                        }}]
                    }));
                }
            }
        }
        (system, contents)
    }

    fn request_body(&self, request: &ChatRequest, tools: Option<&[ToolDefinition]>) -> Value {
        let (system, contents) = Self::convert_messages(&request.messages);
        let mut body = json!({"contents": contents});
        if let Some(system) = system {
            body["systemInstruction"] = json!({"parts": [{"text": system}]});
        }
        let mut generation = json!({});
        if let Some(temperature) = request.options.temperature {
            generation["temperature"] = temperature.into();
        }
        if let Some(max_tokens) = request.options.max_tokens {
            generation["maxOutputTokens"] = max_tokens.into();
        }
        if !request.options.stop.is_empty() {
            generation["stopSequences"] = json!(request.options.stop);
        }
        body["generationConfig"] = generation;
        if let Some(tools) = tools {
            if !tools.is_empty() {
                let declarations: Vec<Value> =
                    tools.iter().map(ToolDefinition::to_gemini).collect();
                body["tools"] = json!([{"functionDeclarations": declarations}]);
            }
        }
        body
    }

    fn convert_response(value: &Value) -> CoreResult<ChatResponse> {
        let parts = value["candidates"][0]["content"]["parts"]
            .as_array()
            .cloned()
            .unwrap_or_default();
        let mut text = String::new();
        let mut tool_calls = Vec::new();
        for part in parts {
            if let Some(chunk) = part["text"].as_str() {
                text.push_str(chunk);
            }
            if let Some(call) = part.get("functionCall") {
                let name = call["name"].as_str().unwrap_or_default().to_string();
                let args = call.get("args").cloned().unwrap_or_else(|| json!({}));
                tool_calls.push(ToolCall::new(
                    format!("gemini-{}", Uuid::new_v4()),
                    name,
                    args.to_string(),
                ));
            }
        }
        Ok(ChatResponse { text, tool_calls })
    }

    async fn post(
        &self,
        request: &ChatRequest,
        tools: Option<&[ToolDefinition]>,
    ) -> CoreResult<ChatResponse> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.config.base_url, self.config.model, self.config.api_key
        );
        let body = self.request_body(request, tools);

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), "Gemini", &error_text));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|e| ReviewError::from(LlmError::InvalidResponse(e.to_string())))?;
        Self::convert_response(&value)
    }
}

#[async_trait]
impl ChatModel for GeminiClient {
    async fn chat(&self, request: ChatRequest) -> CoreResult<ChatResponse> {
        self.post(&request, None).await
    }

    async fn chat_stream(&self, request: ChatRequest) -> CoreResult<ChatStream> {
        let url = format!(
            "{}/models/{}:streamGenerateContent?alt=sse&key={}",
            self.config.base_url, self.config.model, self.config.api_key
        );
        let body = self.request_body(&request, None);

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), "Gemini", &error_text));
        }

        let mut bytes = response.bytes_stream();
        let out = stream! {
            let mut buffer = String::new();
            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(err) => {
                        yield Err(ReviewError::StreamInterrupted(err.to_string()));
                        return;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&chunk));
                while let Some(newline) = buffer.find('\n') {
                    let line = buffer[..newline].trim().to_string();
                    buffer.drain(..=newline);
                    let Some(data) = line.strip_prefix("data:") else { continue };
                    if let Ok(parsed) = serde_json::from_str::<Value>(data.trim()) {
                        if let Some(text) =
                            parsed["candidates"][0]["content"]["parts"][0]["text"].as_str()
                        {
                            if !text.is_empty() {
                                yield Ok(text.to_string());
                            }
                        }
                    }
                }
            }
        };
        Ok(out.boxed())
    }

    async fn chat_with_tools(
        &self,
        request: ChatRequest,
        tools: &[ToolDefinition],
    ) -> CoreResult<ChatResponse> {
        self.post(&request, Some(tools)).await
    }

    fn provider_name(&self) -> &str {
        "gemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GeminiClient {
        GeminiClient::new(RemoteLlmConfig::new(
            "test-key",
            "https://generativelanguage.googleapis.com/v1beta",
            "gemini-1.5-pro",
        ))
    }

    #[test]
    fn system_messages_become_system_instruction() {
        let request = ChatRequest::new(vec![
            Message::system("You review contracts."),
            Message::user("Check clause 14.2"),
        ]);
        let body = client().request_body(&request, None);
        assert_eq!(
            body["systemInstruction"]["parts"][0]["text"],
            "You review contracts."
        );
        assert_eq!(body["contents"][0]["role"], "user");
    }

    #[test]
    fn tool_definitions_become_function_declarations() {
        let request = ChatRequest::new(vec![Message::user("hi")]);
        let tools = vec![ToolDefinition::no_args("get_clause_context", "ctx")];
        let body = client().request_body(&request, Some(&tools));
        assert_eq!(
            body["tools"][0]["functionDeclarations"][0]["name"],
            "get_clause_context"
        );
    }

    #[test]
    fn function_call_parts_become_tool_calls() {
        let value = json!({
            "candidates": [{
                "content": {"parts": [
                    {"text": "Let me check."},
                    {"functionCall": {"name": "get_clause_context", "args": {"clause_id": "1.1"}}}
                ]}
            }]
        });
        let response = GeminiClient::convert_response(&value).unwrap();
        assert_eq!(response.text, "Let me check.");
        assert_eq!(response.tool_calls.len(), 1);
        assert_eq!(response.tool_calls[0].name, "get_clause_context");
        let args: Value = serde_json::from_str(&response.tool_calls[0].arguments).unwrap();
        assert_eq!(args["clause_id"], "1.1");
    }

    #[test]
    fn tool_messages_become_function_responses() {
        let request = ChatRequest::new(vec![Message::tool("get_clause_context", "the text")]);
        let body = client().request_body(&request, None);
        assert_eq!(
            body["contents"][0]["parts"][0]["functionResponse"]["name"],
            "get_clause_context"
        );
    }

    #[test]
    fn empty_candidates_yield_empty_response() {
        let response = GeminiClient::convert_response(&json!({"candidates": []})).unwrap();
        assert!(response.text.is_empty());
        assert!(response.tool_calls.is_empty());
    }
}
