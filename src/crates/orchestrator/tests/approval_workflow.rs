//! Approval interrupt, decision validation, and resume routing.

mod common;

use axum::http::StatusCode;
use common::*;
use review_core::llm::ChatResponse;
use serde_json::json;

async fn start_and_suspend(harness: &TestHarness, task_id: &str) -> serde_json::Value {
    let app = &harness.app;
    post_json(
        app,
        "/api/v1/review/start",
        json!({"task_id": task_id, "domain_id": "testdomain", "auto_start": false}),
    )
    .await;
    upload(app, task_id, "contract.txt", SAMPLE_DOC, "primary").await;
    post_json(app, &format!("/api/v1/review/{task_id}/run"), json!({})).await;
    wait_for_status(app, task_id, "awaiting_approval").await
}

fn pending_diff_ids(harness: &TestHarness, task_id: &str) -> Vec<String> {
    let (frames, _rx) = harness.state.events.subscribe(task_id, None);
    frames
        .iter()
        .rev()
        .find(|f| f.event == "approval_required")
        .map(|f| {
            f.data["pending_diffs"]
                .as_array()
                .unwrap()
                .iter()
                .map(|d| d["diff_id"].as_str().unwrap().to_string())
                .collect()
        })
        .unwrap_or_default()
}

#[tokio::test]
async fn interrupt_approve_resume_completes() {
    let harness = harness(ScriptedModel::new(
        vec![Ok(ChatResponse::text_only(ONE_RISK))],
        vec![Ok(ChatResponse::text_only(REPLACE_DIFF))],
    ));
    let app = &harness.app;

    let status_body = start_and_suspend(&harness, "t_approve").await;
    assert_eq!(status_body["pending_diffs"], 1);

    let diff_ids = pending_diff_ids(&harness, "t_approve");
    assert_eq!(diff_ids.len(), 1);

    let (status, body) = post_json(
        app,
        "/api/v1/review/t_approve/approve",
        json!({"diff_id": diff_ids[0], "decision": "approve"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["accepted"], true);

    let (status, body) = post_json(app, "/api/v1/review/t_approve/resume", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "resumed");

    let final_status = wait_for_status(app, "t_approve", "completed").await;
    assert_eq!(final_status["findings"], 1);
    assert_eq!(final_status["pending_diffs"], 0);

    // The approved change was broadcast as a doc_update.
    let (frames, _rx) = harness.state.events.subscribe("t_approve", None);
    assert!(frames.iter().any(|f| f.event == "doc_update"));
}

#[tokio::test]
async fn incomplete_decisions_block_resume_with_missing_ids() {
    let harness = harness(ScriptedModel::new(
        vec![Ok(ChatResponse::text_only(ONE_RISK))],
        vec![Ok(ChatResponse::text_only(TWO_DIFFS))],
    ));
    let app = &harness.app;

    start_and_suspend(&harness, "t_incomplete").await;
    let diff_ids = pending_diff_ids(&harness, "t_incomplete");
    assert_eq!(diff_ids.len(), 2);

    // Decide only the first diff.
    post_json(
        app,
        "/api/v1/review/t_incomplete/approve",
        json!({"diff_id": diff_ids[0], "decision": "approve"}),
    )
    .await;

    let (status, body) = post_json(app, "/api/v1/review/t_incomplete/resume", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "DECISIONS_INCOMPLETE");
    let missing: Vec<&str> = body["missing"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert_eq!(missing, vec![diff_ids[1].as_str()]);

    // Completing the set unblocks resume.
    post_json(
        app,
        "/api/v1/review/t_incomplete/approve",
        json!({"diff_id": diff_ids[1], "decision": "reject"}),
    )
    .await;
    let (status, _) = post_json(app, "/api/v1/review/t_incomplete/resume", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    wait_for_status(app, "t_incomplete", "completed").await;
}

#[tokio::test]
async fn all_rejected_regenerates_then_terminates() {
    // Three generation rounds, each proposing the same change.
    let harness = harness(ScriptedModel::new(
        vec![Ok(ChatResponse::text_only(ONE_RISK))],
        vec![
            Ok(ChatResponse::text_only(REPLACE_DIFF)),
            Ok(ChatResponse::text_only(REPLACE_DIFF)),
            Ok(ChatResponse::text_only(REPLACE_DIFF)),
        ],
    ));
    let app = &harness.app;

    start_and_suspend(&harness, "t_reject").await;

    let mut rounds = 0;
    loop {
        rounds += 1;
        assert!(rounds <= 4, "regeneration must terminate");
        for diff_id in pending_diff_ids(&harness, "t_reject") {
            post_json(
                app,
                "/api/v1/review/t_reject/approve",
                json!({"diff_id": diff_id, "decision": "reject"}),
            )
            .await;
        }
        let (status, _) = post_json(app, "/api/v1/review/t_reject/resume", json!({})).await;
        assert_eq!(status, StatusCode::OK);

        // Either it suspends again with a regenerated diff, or finishes.
        let mut done = false;
        for _ in 0..500 {
            let (_, body) = get(app, "/api/v1/review/t_reject/status").await;
            match body["status"].as_str() {
                Some("completed") => {
                    done = true;
                    break;
                }
                Some("awaiting_approval") => break,
                _ => tokio::time::sleep(std::time::Duration::from_millis(5)).await,
            }
        }
        if done {
            break;
        }
    }

    // No approvals anywhere, and the regeneration cap left a trace.
    let (frames, _rx) = harness.state.events.subscribe("t_reject", None);
    assert!(!frames.iter().any(|f| f.event == "doc_update"));
    assert!(frames
        .iter()
        .any(|f| f.event == "error" && f.data["kind"] == "regeneration_exhausted"));
}

#[tokio::test]
async fn approve_unknown_task_and_diff() {
    let harness = harness(ScriptedModel::quiet());
    let app = &harness.app;

    let (status, _) = post_json(
        app,
        "/api/v1/review/nonexistent/approve",
        json!({"diff_id": "d1", "decision": "approve"}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    post_json(
        app,
        "/api/v1/review/start",
        json!({"task_id": "t_nodiff", "domain_id": "testdomain", "auto_start": false}),
    )
    .await;
    let (status, _) = post_json(
        app,
        "/api/v1/review/t_nodiff/approve",
        json!({"diff_id": "d_missing", "decision": "approve"}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Bad decision keyword is a validation error.
    let (status, _) = post_json(
        app,
        "/api/v1/review/t_nodiff/approve",
        json!({"diff_id": "d1", "decision": "maybe"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
