//! Session persistence, rehydration, and restart fidelity.

mod common;

use axum::http::StatusCode;
use common::*;
use review_core::llm::ChatResponse;
use serde_json::json;
use std::time::Duration;

#[tokio::test]
async fn start_persists_a_session() {
    let harness = harness(ScriptedModel::quiet());
    post_json(
        &harness.app,
        "/api/v1/review/start",
        json!({"task_id": "sp_start", "domain_id": "testdomain", "auto_start": false}),
    )
    .await;

    // Evict the in-memory entry; status still answers from the store.
    assert_eq!(harness.state.runner.sweep_idle(Duration::ZERO).await, 1);
    let (status, body) = get(&harness.app, "/api/v1/review/sp_start/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["task_id"], "sp_start");
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn rehydrate_endpoint_rebuilds_the_active_entry() {
    let harness = harness(ScriptedModel::quiet());
    let app = &harness.app;
    post_json(
        app,
        "/api/v1/review/start",
        json!({"task_id": "sp_re", "domain_id": "testdomain", "auto_start": false}),
    )
    .await;
    upload(app, "sp_re", "c.txt", SAMPLE_DOC, "primary").await;
    harness.state.runner.sweep_idle(Duration::ZERO).await;
    assert!(harness.state.runner.active_task_ids().is_empty());

    let (status, body) = post_json(app, "/api/v1/review/sp_re/rehydrate", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "rehydrated");
    assert!(harness
        .state
        .runner
        .active_task_ids()
        .contains(&"sp_re".to_string()));

    // The re-parsed document is queryable again.
    let (status, body) = get(app, "/api/v1/review/sp_re/clause/14.2/context").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["text"].as_str().unwrap().contains("10%"));
}

#[tokio::test]
async fn missing_session_rehydrate_404() {
    let harness = harness(ScriptedModel::quiet());
    let (status, _) =
        post_json(&harness.app, "/api/v1/review/sp_missing/rehydrate", json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn terminal_sessions_cannot_rehydrate() {
    let harness = harness(ScriptedModel::new(
        vec![Ok(ChatResponse::text_only("[]"))],
        vec![],
    ));
    let app = &harness.app;
    post_json(
        app,
        "/api/v1/review/start",
        json!({"task_id": "sp_done", "domain_id": "testdomain", "auto_start": false}),
    )
    .await;
    upload(app, "sp_done", "c.txt", SAMPLE_DOC, "primary").await;
    post_json(app, "/api/v1/review/sp_done/run", json!({})).await;
    wait_for_status(app, "sp_done", "completed").await;

    harness.state.runner.sweep_idle(Duration::ZERO).await;
    let (status, _) = post_json(app, "/api/v1/review/sp_done/rehydrate", json!({})).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn approval_state_survives_eviction_and_rehydration() {
    let harness = harness(ScriptedModel::new(
        vec![Ok(ChatResponse::text_only(ONE_RISK))],
        vec![Ok(ChatResponse::text_only(REPLACE_DIFF))],
    ));
    let app = &harness.app;

    post_json(
        app,
        "/api/v1/review/start",
        json!({"task_id": "sp_hydr", "domain_id": "testdomain", "auto_start": false}),
    )
    .await;
    upload(app, "sp_hydr", "c.txt", SAMPLE_DOC, "primary").await;
    post_json(app, "/api/v1/review/sp_hydr/run", json!({})).await;
    let before = wait_for_status(app, "sp_hydr", "awaiting_approval").await;

    let (frames, _rx) = harness.state.events.subscribe("sp_hydr", None);
    let diff_id = frames
        .iter()
        .rev()
        .find(|f| f.event == "approval_required")
        .and_then(|f| f.data["pending_diffs"][0]["diff_id"].as_str())
        .unwrap()
        .to_string();

    // Simulate a restart: drop the in-memory entry, then rehydrate.
    harness.state.runner.sweep_idle(Duration::ZERO).await;
    let (status, _) = post_json(app, "/api/v1/review/sp_hydr/rehydrate", json!({})).await;
    assert_eq!(status, StatusCode::OK);

    let after = wait_for_status(app, "sp_hydr", "awaiting_approval").await;
    assert_eq!(after["current_clause_index"], before["current_clause_index"]);
    assert_eq!(after["pending_diffs"], before["pending_diffs"]);
    assert_eq!(after["findings"], before["findings"]);

    // The restored task resumes to completion.
    post_json(
        app,
        "/api/v1/review/sp_hydr/approve",
        json!({"diff_id": diff_id, "decision": "approve"}),
    )
    .await;
    let (status, _) = post_json(app, "/api/v1/review/sp_hydr/resume", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    wait_for_status(app, "sp_hydr", "completed").await;
}

#[tokio::test]
async fn approve_persists_the_decision() {
    let harness = harness(ScriptedModel::new(
        vec![Ok(ChatResponse::text_only(ONE_RISK))],
        vec![Ok(ChatResponse::text_only(REPLACE_DIFF))],
    ));
    let app = &harness.app;
    post_json(
        app,
        "/api/v1/review/start",
        json!({"task_id": "sp_dec", "domain_id": "testdomain", "auto_start": false}),
    )
    .await;
    upload(app, "sp_dec", "c.txt", SAMPLE_DOC, "primary").await;
    post_json(app, "/api/v1/review/sp_dec/run", json!({})).await;
    wait_for_status(app, "sp_dec", "awaiting_approval").await;

    let (frames, _rx) = harness.state.events.subscribe("sp_dec", None);
    let diff_id = frames
        .iter()
        .rev()
        .find(|f| f.event == "approval_required")
        .and_then(|f| f.data["pending_diffs"][0]["diff_id"].as_str())
        .unwrap()
        .to_string();
    post_json(
        app,
        "/api/v1/review/sp_dec/approve",
        json!({"diff_id": diff_id, "decision": "approve"}),
    )
    .await;

    // The decision is in the store, not just in memory: evict + rehydrate,
    // then resume works without re-posting the decision.
    harness.state.runner.sweep_idle(Duration::ZERO).await;
    post_json(app, "/api/v1/review/sp_dec/rehydrate", json!({})).await;
    let (status, _) = post_json(app, "/api/v1/review/sp_dec/resume", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    wait_for_status(app, "sp_dec", "completed").await;
}

#[tokio::test]
async fn item_chat_records_turns() {
    let harness = harness(ScriptedModel::new(
        vec![Ok(ChatResponse::text_only("[]"))],
        // Chat queue serves the summary first, then the refinement reply.
        vec![
            Ok(ChatResponse::text_only("")),
            Ok(ChatResponse::text_only("Raised to 20% as requested.")),
        ],
    ));
    let app = &harness.app;
    post_json(
        app,
        "/api/v1/review/start",
        json!({"task_id": "sp_chat", "domain_id": "testdomain", "auto_start": false}),
    )
    .await;
    upload(app, "sp_chat", "c.txt", SAMPLE_DOC, "primary").await;
    post_json(app, "/api/v1/review/sp_chat/run", json!({})).await;
    wait_for_status(app, "sp_chat", "completed").await;

    let (status, body) = post_json(
        app,
        "/api/v1/review/sp_chat/item/14.2/chat",
        json!({"message": "Please raise the advance."}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["reply"], "Raised to 20% as requested.");

    let (status, body) = get(app, "/api/v1/review/sp_chat/item/14.2/chat").await;
    assert_eq!(status, StatusCode::OK);
    let turns = body["turns"].as_array().unwrap();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0]["role"], "user");
    assert_eq!(turns[1]["role"], "assistant");
}
