//! The chat model trait.

use crate::error::Result;
use crate::llm::options::ChatRequest;
use crate::llm::tools::ToolDefinition;
use crate::messages::ToolCall;
use async_trait::async_trait;
use futures::stream::BoxStream;

/// A complete model response.
///
/// Responses are atomic: either pure text, or text plus a finished list of
/// tool calls. Providers that emit partial tool-call deltas buffer them
/// internally; mixing deltas into the external contract is not permitted.
#[derive(Debug, Clone, Default)]
pub struct ChatResponse {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
}

impl ChatResponse {
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Ordered stream of text chunks. Chunk order is provider byte order.
pub type ChatStream = BoxStream<'static, Result<String>>;

/// Chat-based language model.
///
/// Implemented by the provider clients and by the failover adapter that
/// wraps an ordered list of them. Everything in the engine talks to this
/// trait; nothing below the adapter knows which provider answered.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Generate a complete text response.
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse>;

    /// Stream the response chunk by chunk.
    ///
    /// Failover is only permitted before the first chunk has been yielded to
    /// the consumer; a mid-stream failure must surface as
    /// [`ReviewError::StreamInterrupted`](crate::ReviewError::StreamInterrupted)
    /// so ordering is never silently broken.
    async fn chat_stream(&self, request: ChatRequest) -> Result<ChatStream>;

    /// Generate a response that may request tool calls.
    async fn chat_with_tools(
        &self,
        request: ChatRequest,
        tools: &[ToolDefinition],
    ) -> Result<ChatResponse>;

    /// Provider label for logs and events.
    fn provider_name(&self) -> &str;
}
