//! Review lifecycle endpoints.

use crate::api::error::{ApiError, ApiResult};
use crate::api::extract::AuthUser;
use crate::api::handlers::authorize_task;
use crate::api::routes::AppState;
use crate::runner::MAX_UPLOAD_BYTES;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use futures::Stream;
use review_core::{Decision, DocumentRole};
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use tokio::sync::broadcast;
use tracing::debug;

#[derive(Debug, Deserialize)]
pub struct StartReviewRequest {
    pub task_id: String,
    #[serde(default = "default_domain")]
    pub domain_id: String,
    #[serde(default)]
    pub domain_subtype: Option<String>,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub our_party: Option<String>,
    #[serde(default = "default_auto_start")]
    pub auto_start: bool,
}

fn default_domain() -> String {
    "construction".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_auto_start() -> bool {
    true
}

pub async fn start_review(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<StartReviewRequest>,
) -> ApiResult<Json<Value>> {
    if body.task_id.trim().is_empty() {
        return Err(ApiError::Validation("task_id must not be empty".to_string()));
    }
    let plugin = state
        .plugins
        .get(&body.domain_id)
        .ok_or_else(|| ApiError::NotFound(format!("domain {}", body.domain_id)))?;
    if let Some(subtype) = &body.domain_subtype {
        if !plugin.supported_subtypes.contains(subtype) {
            return Err(ApiError::Validation(format!(
                "domain {} does not support subtype {subtype}",
                body.domain_id
            )));
        }
    }
    state.quota.check(&user_id).await?;

    let status = state
        .runner
        .create_task(
            &body.task_id,
            &user_id,
            &body.domain_id,
            &body.language,
            body.our_party.as_deref().unwrap_or(""),
            body.auto_start,
        )
        .await?;
    Ok(Json(json!({"task_id": body.task_id, "status": status.as_str()})))
}

pub async fn upload_document(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(task_id): Path<String>,
    mut multipart: Multipart,
) -> ApiResult<Json<Value>> {
    authorize_task(&state, &task_id, &user_id).await?;

    let mut filename = None;
    let mut bytes: Option<Vec<u8>> = None;
    let mut role = DocumentRole::Primary;
    let mut language = None;
    let mut our_party = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                filename = field.file_name().map(String::from);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("upload read failed: {e}")))?;
                if data.len() > MAX_UPLOAD_BYTES {
                    return Err(ApiError::Validation(format!(
                        "file exceeds the {} byte limit",
                        MAX_UPLOAD_BYTES
                    )));
                }
                bytes = Some(data.to_vec());
            }
            "role" => {
                let value = field.text().await.unwrap_or_default();
                role = DocumentRole::parse(&value)
                    .ok_or_else(|| ApiError::Validation(format!("unknown role {value}")))?;
            }
            "language" => language = Some(field.text().await.unwrap_or_default()),
            "our_party" => our_party = Some(field.text().await.unwrap_or_default()),
            other => debug!(field = %other, "ignoring unknown multipart field"),
        }
    }

    let filename = filename.ok_or_else(|| ApiError::Validation("missing file field".to_string()))?;
    let bytes = bytes.ok_or_else(|| ApiError::Validation("missing file field".to_string()))?;
    let lower = filename.to_lowercase();
    if !(lower.ends_with(".txt") || lower.ends_with(".md")) {
        return Err(ApiError::Validation(format!(
            "unsupported file type: {filename}; plain text (.txt, .md) only"
        )));
    }

    let total_clauses = state
        .runner
        .upload_document(&task_id, role, &filename, &bytes, language, our_party)
        .await?;
    Ok(Json(json!({"role": role.as_str(), "total_clauses": total_clauses})))
}

pub async fn list_documents(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(task_id): Path<String>,
) -> ApiResult<Json<Value>> {
    authorize_task(&state, &task_id, &user_id).await?;
    let documents = state.runner.list_documents(&task_id).await?;
    Ok(Json(json!({"documents": documents})))
}

pub async fn run_review(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(task_id): Path<String>,
) -> ApiResult<Json<Value>> {
    authorize_task(&state, &task_id, &user_id).await?;
    state.quota.check(&user_id).await?;
    let status = state.runner.run(&task_id).await?;
    Ok(Json(json!({"status": status})))
}

#[derive(Debug, Deserialize)]
pub struct ApproveRequest {
    pub diff_id: String,
    pub decision: String,
    #[serde(default)]
    pub feedback: Option<String>,
}

pub async fn approve(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(task_id): Path<String>,
    Json(body): Json<ApproveRequest>,
) -> ApiResult<Json<Value>> {
    authorize_task(&state, &task_id, &user_id).await?;
    let decision = match body.decision.as_str() {
        "approve" => Decision::Approve,
        "reject" => Decision::Reject,
        other => {
            return Err(ApiError::Validation(format!(
                "decision must be approve or reject, got {other}"
            )))
        }
    };
    state
        .runner
        .approve(&task_id, &body.diff_id, decision, body.feedback)
        .await?;
    Ok(Json(json!({"accepted": true})))
}

pub async fn resume(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(task_id): Path<String>,
) -> ApiResult<Json<Value>> {
    authorize_task(&state, &task_id, &user_id).await?;
    let status = state.runner.resume(&task_id).await?;
    Ok(Json(json!({"status": status})))
}

pub async fn status(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(task_id): Path<String>,
) -> ApiResult<Json<Value>> {
    authorize_task(&state, &task_id, &user_id).await?;
    let view = state.runner.status(&task_id).await?;
    Ok(Json(serde_json::to_value(view).unwrap_or(Value::Null)))
}

pub async fn rehydrate(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(task_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let status = state.runner.rehydrate(&task_id).await?;
    // Ownership is checked after rehydration put the task back in memory.
    authorize_task(&state, &task_id, &user_id).await?;
    Ok(Json(json!({
        "task_id": task_id,
        "status": "rehydrated",
        "task_status": status.as_str(),
    })))
}

pub async fn cancel(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(task_id): Path<String>,
) -> ApiResult<Json<Value>> {
    authorize_task(&state, &task_id, &user_id).await?;
    state.runner.cancel(&task_id).await?;
    Ok(Json(json!({"status": "cancelled"})))
}

pub async fn clause_context(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((task_id, clause_id)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    authorize_task(&state, &task_id, &user_id).await?;
    let view = state.runner.clause_context(&task_id, &clause_id).await?;
    Ok(Json(serde_json::to_value(view).unwrap_or(Value::Null)))
}

#[derive(Debug, Deserialize)]
pub struct ItemChatRequest {
    pub message: String,
}

pub async fn item_chat(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((task_id, clause_id)): Path<(String, String)>,
    Json(body): Json<ItemChatRequest>,
) -> ApiResult<Json<Value>> {
    authorize_task(&state, &task_id, &user_id).await?;
    if body.message.trim().is_empty() {
        return Err(ApiError::Validation("message must not be empty".to_string()));
    }
    let reply = state
        .runner
        .item_chat(&task_id, &clause_id, &body.message)
        .await?;
    Ok(Json(json!({"reply": reply})))
}

pub async fn item_chat_history(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((task_id, clause_id)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    authorize_task(&state, &task_id, &user_id).await?;
    let turns = state.runner.chat_history(&task_id, &clause_id).await?;
    Ok(Json(json!({"turns": turns})))
}

#[derive(Debug, Deserialize)]
pub struct StreamParams {
    #[serde(default)]
    pub last_seq: Option<u64>,
}

pub async fn stream_events(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(task_id): Path<String>,
    headers: HeaderMap,
    Query(params): Query<StreamParams>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    authorize_task(&state, &task_id, &user_id).await?;

    let last_seq = headers
        .get("last-event-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .or(params.last_seq);
    let (replay, mut rx) = state.events.subscribe(&task_id, last_seq);

    let stream = async_stream::stream! {
        let mut last_delivered = last_seq.unwrap_or(0);
        for frame in replay {
            last_delivered = frame.seq;
            yield Ok::<_, Infallible>(frame.to_event());
        }
        loop {
            match rx.recv().await {
                // A frame can be both in the replay buffer and the live
                // channel; sequence numbers make the duplicate visible.
                Ok(frame) if frame.seq <= last_delivered => continue,
                Ok(frame) => {
                    last_delivered = frame.seq;
                    yield Ok(frame.to_event());
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // Oldest events were dropped; tell the client to
                    // re-fetch state instead of pretending nothing is lost.
                    let notice = json!({"detail": "stream lagged", "skipped": skipped});
                    yield Ok(Event::default().event("error").data(notice.to_string()));
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    };
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
