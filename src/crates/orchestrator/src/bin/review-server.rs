//! Server entry point.

use anyhow::Context;
use llm::{DeepseekClient, FailoverClient, GeminiClient, RemoteLlmConfig};
use orchestrator::api::sse::EventBus;
use orchestrator::db;
use orchestrator::plugins::{register_construction_plugin, PluginRegistry};
use orchestrator::services::{AuthVerifier, MemoryQuotaStore, QuotaService, SessionManager};
use orchestrator::storage::BlobStorage;
use orchestrator::{create_router, AppState, ServerConfig, SessionBackend, TaskRunner};
use review_checkpoint::{Checkpointer, MemorySessionStore};
use review_core::ChatModel;
use skills::{register_builtin_skills, SkillRegistry};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Arc::new(ServerConfig::from_env());
    info!(addr = %config.bind_addr, "starting review server");

    // Model providers, primary first.
    let mut providers: Vec<Arc<dyn ChatModel>> = Vec::new();
    if let Some(key) = &config.deepseek_api_key {
        providers.push(Arc::new(DeepseekClient::new(RemoteLlmConfig::new(
            key.clone(),
            "https://api.deepseek.com",
            "deepseek-chat",
        ))));
    }
    if let Some(key) = &config.gemini_api_key {
        providers.push(Arc::new(GeminiClient::new(RemoteLlmConfig::new(
            key.clone(),
            "https://generativelanguage.googleapis.com/v1beta",
            "gemini-1.5-pro",
        ))));
    }
    if providers.is_empty() {
        warn!("no provider API keys configured; reviews will fail at the first model call");
    }
    let model: Arc<dyn ChatModel> = Arc::new(FailoverClient::new(providers));

    // Session + quota backends.
    let (session_store, quota_service): (Arc<dyn Checkpointer>, Arc<QuotaService>) =
        match config.session_backend {
            SessionBackend::Sqlite => {
                let pool = db::connect(&config.database_url)
                    .await
                    .context("database connection failed")?;
                (
                    Arc::new(db::SqliteSessionStore::new(pool.clone())),
                    Arc::new(QuotaService::new(
                        Arc::new(db::SqliteQuotaStore::new(pool)),
                        config.billing_enabled,
                    )),
                )
            }
            SessionBackend::Memory => (
                Arc::new(MemorySessionStore::new()),
                Arc::new(QuotaService::new(
                    Arc::new(MemoryQuotaStore::new()),
                    config.billing_enabled,
                )),
            ),
        };

    let plugins = Arc::new(PluginRegistry::new());
    register_construction_plugin(&plugins);

    let mut skill_registry = SkillRegistry::new();
    register_builtin_skills(&mut skill_registry).context("skill registration failed")?;
    let skill_registry = Arc::new(skill_registry);

    let sessions = Arc::new(SessionManager::new(session_store));
    let events = Arc::new(EventBus::new());
    let storage = Arc::new(BlobStorage::new(config.data_dir.clone()));

    let runner = Arc::new(TaskRunner::new(
        model,
        skill_registry.clone(),
        plugins.clone(),
        sessions,
        quota_service.clone(),
        events.clone(),
        storage,
    ));

    // Background sweep for idle tasks.
    let sweep_runner = runner.clone();
    let idle = Duration::from_secs(config.idle_sweep_secs);
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(60));
        loop {
            tick.tick().await;
            let evicted = sweep_runner.sweep_idle(idle).await;
            if evicted > 0 {
                info!(evicted, "idle sweep evicted tasks");
            }
        }
    });

    let state = AppState {
        config: config.clone(),
        plugins,
        skills: skill_registry,
        quota: quota_service,
        events,
        runner,
        auth: Arc::new(AuthVerifier::new(config.jwks_url.clone(), config.auth_disabled)),
    };

    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .context("bind failed")?;
    info!("listening on {}", config.bind_addr);
    axum::serve(listener, app).await.context("server exited")?;
    Ok(())
}
