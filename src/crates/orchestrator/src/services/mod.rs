//! Server-side services: auth, quota, and session management.

pub mod auth;
pub mod quota;
pub mod sessions;

pub use auth::AuthVerifier;
pub use quota::{MemoryQuotaStore, QuotaService, QuotaStore};
pub use sessions::SessionManager;
