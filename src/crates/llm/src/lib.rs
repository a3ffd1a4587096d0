//! LLM provider implementations for the review engine.
//!
//! Concrete implementations of the `ChatModel` trait from `review-core`:
//!
//! - **DeepSeek**: OpenAI-compatible wire format, the default primary.
//! - **Gemini**: Google's generateContent format, the default fallback.
//! - **FailoverClient**: an ordered list of providers behind the same
//!   trait; retries once per provider with jittered backoff, then falls
//!   through. Streaming only fails over before the first byte reaches the
//!   consumer.
//!
//! # Example
//!
//! ```rust,ignore
//! use llm::{DeepseekClient, FailoverClient, GeminiClient, RemoteLlmConfig};
//! use review_core::{ChatModel, ChatRequest, Message};
//! use std::sync::Arc;
//!
//! let primary = DeepseekClient::new(RemoteLlmConfig::from_env(
//!     "DEEPSEEK_API_KEY",
//!     "https://api.deepseek.com",
//!     "deepseek-chat",
//! )?);
//! let fallback = GeminiClient::new(RemoteLlmConfig::from_env(
//!     "GEMINI_API_KEY",
//!     "https://generativelanguage.googleapis.com/v1beta",
//!     "gemini-1.5-pro",
//! )?);
//! let model = FailoverClient::new(vec![Arc::new(primary), Arc::new(fallback)]);
//!
//! let response = model.chat(ChatRequest::new(vec![Message::user("Hello")])).await?;
//! ```

pub mod config;
pub mod error;
pub mod failover;
pub mod remote;
pub mod retry;

pub use config::RemoteLlmConfig;
pub use error::{LlmError, Result};
pub use failover::FailoverClient;
pub use remote::{DeepseekClient, GeminiClient};
pub use retry::RetryPolicy;

// Re-export core types for convenience.
pub use review_core::llm::{ChatModel, ChatOptions, ChatRequest, ChatResponse, ToolDefinition};
pub use review_core::Message;
