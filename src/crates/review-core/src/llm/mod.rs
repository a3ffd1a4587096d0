//! Provider-agnostic chat model interface.
//!
//! The engine is an orchestrator, not an LLM client library: this module
//! defines the traits and request/response types, and provider crates
//! implement them. See the `llm` workspace crate for the concrete DeepSeek
//! and Gemini clients and the failover adapter.

pub mod options;
pub mod tools;
pub mod traits;

pub use options::{ChatOptions, ChatRequest};
pub use tools::ToolDefinition;
pub use traits::{ChatModel, ChatResponse, ChatStream};
