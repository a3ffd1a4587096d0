//! Shared fixtures for the API integration tests.

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use async_trait::async_trait;
use orchestrator::api::sse::EventBus;
use orchestrator::plugins::{DomainPlugin, PluginRegistry};
use orchestrator::services::{AuthVerifier, MemoryQuotaStore, QuotaService, SessionManager};
pub use orchestrator::services::QuotaStore;
use orchestrator::storage::BlobStorage;
use orchestrator::{create_router, AppState, ServerConfig, TaskRunner};
use parking_lot::Mutex;
use parser::ParserConfig;
use review_checkpoint::MemorySessionStore;
use review_core::llm::{ChatModel, ChatRequest, ChatResponse, ChatStream, ToolDefinition};
use review_core::{ChecklistItem, Priority, Result};
use skills::{register_builtin_skills, SkillRegistry};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

/// Model that replays scripted responses: one queue for tool-enabled
/// calls (clause analysis), one for plain chat (diff generation, summary).
pub struct ScriptedModel {
    tool_queue: Mutex<Vec<Result<ChatResponse>>>,
    chat_queue: Mutex<Vec<Result<ChatResponse>>>,
}

impl ScriptedModel {
    pub fn new(
        tool_queue: Vec<Result<ChatResponse>>,
        chat_queue: Vec<Result<ChatResponse>>,
    ) -> Self {
        Self {
            tool_queue: Mutex::new(tool_queue),
            chat_queue: Mutex::new(chat_queue),
        }
    }

    /// A model that never finds anything.
    pub fn quiet() -> Self {
        Self::new(vec![], vec![])
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse> {
        let mut queue = self.chat_queue.lock();
        if queue.is_empty() {
            Ok(ChatResponse::text_only(""))
        } else {
            queue.remove(0)
        }
    }

    async fn chat_stream(&self, _request: ChatRequest) -> Result<ChatStream> {
        use futures::StreamExt;
        Ok(futures::stream::iter(vec![Ok("[]".to_string())]).boxed())
    }

    async fn chat_with_tools(
        &self,
        _request: ChatRequest,
        _tools: &[ToolDefinition],
    ) -> Result<ChatResponse> {
        let mut queue = self.tool_queue.lock();
        if queue.is_empty() {
            Ok(ChatResponse::text_only("[]"))
        } else {
            queue.remove(0)
        }
    }

    fn provider_name(&self) -> &str {
        "scripted"
    }
}

/// Everything a test needs to poke at the server's internals.
pub struct TestHarness {
    pub app: Router,
    pub state: AppState,
    pub quota_store: Arc<MemoryQuotaStore>,
    _data_dir: tempfile::TempDir,
}

pub const ONE_RISK: &str = r#"[{"risk_level":"high","risk_type":"payment","description":"advance too low","reason":"cashflow","original_text":"10%"}]"#;
pub const REPLACE_DIFF: &str = r#"[{"action":"replace","original_text":"10%","proposed_text":"20%","reason":"raise the advance","risk_level":"high"}]"#;
pub const TWO_DIFFS: &str = r#"[
  {"action":"replace","original_text":"10%","proposed_text":"20%","reason":"raise","risk_level":"high"},
  {"action":"replace","original_text":"28 days","proposed_text":"56 days","reason":"extend","risk_level":"medium"}
]"#;
pub const SAMPLE_DOC: &str =
    "14.2 Advance Payment\nThe Advance Payment shall be 10% within 28 days.\n";

/// Single-clause test domain so scripted models line up with one clause.
fn test_plugin() -> DomainPlugin {
    DomainPlugin {
        domain_id: "testdomain".to_string(),
        name: "Test domain".to_string(),
        supported_subtypes: vec!["default".to_string()],
        parser_config: ParserConfig::default(),
        checklist: vec![ChecklistItem {
            clause_id: "14.2".to_string(),
            name: "Advance Payment".to_string(),
            description: "Check the advance payment terms".to_string(),
            priority: Priority::High,
            required_skills: vec!["get_clause_context".to_string()],
            suggested_skills: vec![],
        }],
        preferred_skills: vec![],
    }
}

pub fn harness(model: ScriptedModel) -> TestHarness {
    harness_with_billing(model, false)
}

pub fn harness_with_billing(model: ScriptedModel, billing: bool) -> TestHarness {
    let data_dir = tempfile::tempdir().expect("tempdir");
    let mut config = ServerConfig::for_tests(data_dir.path().to_path_buf());
    config.billing_enabled = billing;
    let config = Arc::new(config);

    let plugins = Arc::new(PluginRegistry::new());
    orchestrator::plugins::register_construction_plugin(&plugins);
    plugins.register(test_plugin());

    let mut skill_registry = SkillRegistry::new();
    register_builtin_skills(&mut skill_registry).expect("builtin skills register");
    let skill_registry = Arc::new(skill_registry);

    let quota_store = Arc::new(MemoryQuotaStore::new());
    let quota = Arc::new(QuotaService::new(quota_store.clone(), billing));
    let sessions = Arc::new(SessionManager::new(Arc::new(MemorySessionStore::new())));
    let events = Arc::new(EventBus::new());
    let storage = Arc::new(BlobStorage::new(data_dir.path()));

    let runner = Arc::new(TaskRunner::new(
        Arc::new(model),
        skill_registry.clone(),
        plugins.clone(),
        sessions,
        quota.clone(),
        events.clone(),
        storage,
    ));

    let state = AppState {
        config: config.clone(),
        plugins,
        skills: skill_registry,
        quota,
        events,
        runner,
        auth: Arc::new(AuthVerifier::new("", true)),
    };
    TestHarness {
        app: create_router(state.clone()),
        state,
        quota_store,
        _data_dir: data_dir,
    }
}

pub async fn post_json(
    app: &Router,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request builds");
    send(app, request).await
}

pub async fn get(app: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("request builds");
    send(app, request).await
}

pub async fn upload(
    app: &Router,
    task_id: &str,
    filename: &str,
    content: &str,
    role: &str,
) -> (StatusCode, serde_json::Value) {
    let boundary = "xXxTESTBOUNDARYxXx";
    let body = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"role\"\r\n\r\n\
         {role}\r\n\
         --{boundary}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
         Content-Type: text/plain\r\n\r\n\
         {content}\r\n\
         --{boundary}--\r\n"
    );
    let request = Request::builder()
        .method("POST")
        .uri(format!("/api/v1/review/{task_id}/upload"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .expect("request builds");
    send(app, request).await
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(request).await.expect("request sent");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body read");
    let value = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, value)
}

/// Poll the status endpoint until the task reaches `wanted` or time runs
/// out.
pub async fn wait_for_status(app: &Router, task_id: &str, wanted: &str) -> serde_json::Value {
    for _ in 0..500 {
        let (status, body) = get(app, &format!("/api/v1/review/{task_id}/status")).await;
        if status == StatusCode::OK && body["status"] == wanted {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("task {task_id} never reached status {wanted}");
}
