//! Environment-driven server configuration.

use std::net::SocketAddr;
use std::path::PathBuf;

/// Which session store backs the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionBackend {
    Memory,
    Sqlite,
}

/// Everything the server reads from the environment, loaded once at
/// startup. No subcommands; the process is a single long-running server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Root directory for uploaded document blobs.
    pub data_dir: PathBuf,
    pub session_backend: SessionBackend,
    /// Sqlite connection string, used when the backend is `Sqlite`.
    pub database_url: String,
    /// When false, quota is never checked or deducted.
    pub billing_enabled: bool,
    /// Development/test switch: every request authenticates as `dev-user`.
    pub auth_disabled: bool,
    /// JWK set endpoint for bearer token verification.
    pub jwks_url: String,
    pub deepseek_api_key: Option<String>,
    pub gemini_api_key: Option<String>,
    /// Idle seconds before an inactive task is swept from memory.
    pub idle_sweep_secs: u64,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        let bind_addr = std::env::var("BIND_ADDR")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(|| "0.0.0.0:8000".parse().expect("static addr parses"));
        let session_backend = match std::env::var("SESSION_BACKEND").as_deref() {
            Ok("sqlite") => SessionBackend::Sqlite,
            _ => SessionBackend::Memory,
        };
        Self {
            bind_addr,
            data_dir: std::env::var("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data")),
            session_backend,
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://review.db".to_string()),
            billing_enabled: env_flag("BILLING_ENABLED", false),
            auth_disabled: env_flag("AUTH_DISABLED", false),
            jwks_url: std::env::var("AUTH_JWKS_URL").unwrap_or_default(),
            deepseek_api_key: std::env::var("DEEPSEEK_API_KEY").ok().filter(|v| !v.is_empty()),
            gemini_api_key: std::env::var("GEMINI_API_KEY").ok().filter(|v| !v.is_empty()),
            idle_sweep_secs: std::env::var("IDLE_SWEEP_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3600),
        }
    }

    /// Configuration for tests: memory store, auth off, billing off.
    pub fn for_tests(data_dir: PathBuf) -> Self {
        Self {
            bind_addr: "127.0.0.1:0".parse().expect("static addr parses"),
            data_dir,
            session_backend: SessionBackend::Memory,
            database_url: String::new(),
            billing_enabled: false,
            auth_disabled: true,
            jwks_url: String::new(),
            deepseek_api_key: None,
            gemini_api_key: None,
            idle_sweep_secs: 3600,
        }
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(value) => matches!(value.as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_parsing() {
        std::env::set_var("CONFIG_TEST_FLAG_A", "1");
        std::env::set_var("CONFIG_TEST_FLAG_B", "false");
        assert!(env_flag("CONFIG_TEST_FLAG_A", false));
        assert!(!env_flag("CONFIG_TEST_FLAG_B", true));
        assert!(env_flag("CONFIG_TEST_FLAG_MISSING", true));
        std::env::remove_var("CONFIG_TEST_FLAG_A");
        std::env::remove_var("CONFIG_TEST_FLAG_B");
    }

    #[test]
    fn test_config_is_safe_for_tests() {
        let config = ServerConfig::for_tests(PathBuf::from("/tmp/x"));
        assert!(config.auth_disabled);
        assert!(!config.billing_enabled);
        assert_eq!(config.session_backend, SessionBackend::Memory);
    }
}
