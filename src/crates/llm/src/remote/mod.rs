//! Remote provider clients.

pub mod deepseek;
pub mod gemini;

pub use deepseek::DeepseekClient;
pub use gemini::GeminiClient;
