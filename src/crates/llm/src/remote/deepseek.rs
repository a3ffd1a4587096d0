//! DeepSeek client (OpenAI-compatible wire format).

use crate::config::RemoteLlmConfig;
use crate::error::LlmError;
use async_stream::stream;
use async_trait::async_trait;
use futures::StreamExt;
use review_core::llm::{ChatModel, ChatRequest, ChatResponse, ChatStream, ToolDefinition};
use review_core::{Message, MessageRole, ReviewError, Result as CoreResult, ToolCall};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// DeepSeek API client.
#[derive(Clone)]
pub struct DeepseekClient {
    config: RemoteLlmConfig,
    client: Client,
}

impl DeepseekClient {
    pub fn new(config: RemoteLlmConfig) -> Self {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("Failed to create HTTP client");
        Self { config, client }
    }

    fn convert_message(msg: &Message) -> WireMessage {
        WireMessage {
            role: match msg.role {
                MessageRole::System => "system",
                MessageRole::User => "user",
                MessageRole::Assistant => "assistant",
                MessageRole::Tool => "tool",
            }
            .to_string(),
            content: msg.content.clone(),
            tool_calls: msg.tool_calls.as_ref().map(|calls| {
                calls
                    .iter()
                    .map(|c| WireToolCall {
                        id: c.id.clone(),
                        kind: "function".to_string(),
                        function: WireFunction {
                            name: c.name.clone(),
                            arguments: c.arguments.clone(),
                        },
                    })
                    .collect()
            }),
            tool_call_id: msg.tool_call_id.clone(),
        }
    }

    fn request_body(&self, request: &ChatRequest, tools: Option<&[ToolDefinition]>, stream: bool) -> Value {
        let messages: Vec<WireMessage> =
            request.messages.iter().map(Self::convert_message).collect();
        let mut body = serde_json::json!({
            "model": self.config.model,
            "messages": messages,
            "stream": stream,
        });
        if let Some(temperature) = request.options.temperature {
            body["temperature"] = temperature.into();
        }
        if let Some(max_tokens) = request.options.max_tokens {
            body["max_tokens"] = max_tokens.into();
        }
        if !request.options.stop.is_empty() {
            body["stop"] = serde_json::json!(request.options.stop);
        }
        if let Some(tools) = tools {
            if !tools.is_empty() {
                let rendered: Vec<Value> = tools.iter().map(ToolDefinition::to_openai).collect();
                body["tools"] = Value::Array(rendered);
            }
        }
        body
    }

    async fn post(&self, request: &ChatRequest, tools: Option<&[ToolDefinition]>) -> CoreResult<ChatResponse> {
        let url = format!("{}/v1/chat/completions", self.config.base_url);
        let body = self.request_body(request, tools, false);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&body)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), "DeepSeek", &error_text));
        }

        let wire: WireResponse = response
            .json()
            .await
            .map_err(|e| ReviewError::from(LlmError::InvalidResponse(e.to_string())))?;
        let choice = wire
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ReviewError::from(LlmError::InvalidResponse("no choices".into())))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|c| ToolCall::new(c.id, c.function.name, c.function.arguments))
            .collect();
        Ok(ChatResponse {
            text: choice.message.content.unwrap_or_default(),
            tool_calls,
        })
    }
}

#[async_trait]
impl ChatModel for DeepseekClient {
    async fn chat(&self, request: ChatRequest) -> CoreResult<ChatResponse> {
        self.post(&request, None).await
    }

    async fn chat_stream(&self, request: ChatRequest) -> CoreResult<ChatStream> {
        let url = format!("{}/v1/chat/completions", self.config.base_url);
        let body = self.request_body(&request, None, true);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&body)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), "DeepSeek", &error_text));
        }

        // Server-sent `data:` lines; chunk boundaries are arbitrary, so
        // line-buffer across reads. Failures from here on are mid-stream.
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
                    let data = data.trim();
                    if data == "[DONE]" {
                        return;
                    }
                    if let Ok(parsed) = serde_json::from_str::<Value>(data) {
                        if let Some(delta) = parsed["choices"][0]["delta"]["content"].as_str() {
                            if !delta.is_empty() {
                                yield Ok(delta.to_string());
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
        "deepseek"
    }
}

pub(crate) fn classify_reqwest_error(err: reqwest::Error) -> ReviewError {
    if err.is_timeout() {
        ReviewError::from(LlmError::Timeout(err.to_string()))
    } else {
        ReviewError::from(LlmError::Http(err))
    }
}

pub(crate) fn classify_status(status: u16, provider: &str, body: &str) -> ReviewError {
    let err = match status {
        401 | 403 => LlmError::Authentication(format!("{provider}: {body}")),
        429 => LlmError::RateLimited(format!("{provider}: {body}")),
        _ => LlmError::Provider(format!("{provider} API error {status}: {body}")),
    };
    err.into()
}

// Wire types (OpenAI-compatible).
#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    function: WireFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    choices: Vec<WireChoice>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
}

#[derive(Debug, Deserialize)]
struct WireResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}
