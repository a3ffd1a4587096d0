//! API route definitions.

use crate::api::handlers;
use crate::api::sse::EventBus;
use crate::config::ServerConfig;
use crate::plugins::PluginRegistry;
use crate::runner::TaskRunner;
use crate::runner::MAX_UPLOAD_BYTES;
use crate::services::{AuthVerifier, QuotaService};
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use skills::SkillRegistry;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub plugins: Arc<PluginRegistry>,
    pub skills: Arc<SkillRegistry>,
    pub quota: Arc<QuotaService>,
    pub events: Arc<EventBus>,
    pub runner: Arc<TaskRunner>,
    pub auth: Arc<AuthVerifier>,
}

/// Build the complete API router.
pub fn create_router(state: AppState) -> Router {
    // Errors must carry CORS headers too, so the layer wraps everything.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/healthz", get(handlers::health::health))
        // Review lifecycle
        .route("/api/v1/review/start", post(handlers::review::start_review))
        .route("/api/v1/review/:id/upload", post(handlers::review::upload_document))
        .route("/api/v1/review/:id/documents", get(handlers::review::list_documents))
        .route("/api/v1/review/:id/run", post(handlers::review::run_review))
        .route("/api/v1/review/:id/approve", post(handlers::review::approve))
        .route("/api/v1/review/:id/resume", post(handlers::review::resume))
        .route("/api/v1/review/:id/status", get(handlers::review::status))
        .route("/api/v1/review/:id/rehydrate", post(handlers::review::rehydrate))
        .route("/api/v1/review/:id/cancel", post(handlers::review::cancel))
        .route(
            "/api/v1/review/:id/clause/:clause_id/context",
            get(handlers::review::clause_context),
        )
        .route(
            "/api/v1/review/:id/item/:clause_id/chat",
            post(handlers::review::item_chat).get(handlers::review::item_chat_history),
        )
        .route("/api/v1/review/:id/stream", get(handlers::review::stream_events))
        // Domain plugin introspection
        .route("/api/v1/domains", get(handlers::domains::list_domains))
        .route("/api/v1/domains/:id", get(handlers::domains::get_domain))
        // Skill introspection
        .route("/api/v1/skills", get(handlers::skills::list_skills))
        .route("/api/v1/skills/by-domain/:id", get(handlers::skills::skills_by_domain))
        .route("/api/v1/skills/:id", get(handlers::skills::get_skill))
        // Room for the multipart framing on top of the document cap.
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES + 64 * 1024))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
