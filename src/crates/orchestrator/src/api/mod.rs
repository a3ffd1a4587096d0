//! HTTP API: routes, handlers, error mapping, and the SSE bus.

pub mod error;
pub mod extract;
pub mod handlers;
pub mod routes;
pub mod sse;

pub use error::{ApiError, ApiResult};
pub use sse::EventBus;
