//! Remote workflow backend.
//!
//! Remote skills submit their input to a workflow engine, then poll the
//! run by id until it reaches a terminal state or the attempt budget is
//! spent. Terminal states map onto the skill failure taxonomy: a missing
//! run is `not_found`, a terminal failure is `backend_error`, and a run
//! still executing after the last attempt is `timeout`.

use crate::error::SkillError;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// State of a remote workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowStatus {
    Executing,
    Finished,
    Failed,
}

/// One observation of a run.
#[derive(Debug, Clone)]
pub struct WorkflowRun {
    pub status: WorkflowStatus,
    /// Output payload, present once finished.
    pub output: Option<Value>,
    /// Engine-reported error, present when failed.
    pub error: Option<String>,
}

/// Client interface to the workflow engine. The HTTP implementation talks
/// to the real engine; tests script observations.
#[async_trait]
pub trait WorkflowEngine: Send + Sync {
    /// Submit a run, returning its id.
    async fn submit(&self, workflow_id: &str, input: Value) -> Result<String, SkillError>;

    /// Observe a run by id.
    async fn get_run(&self, run_id: &str) -> Result<WorkflowRun, SkillError>;

    /// How many poll attempts before giving up.
    fn max_poll_attempts(&self) -> usize {
        10
    }

    /// Delay between polls.
    fn poll_interval(&self) -> Duration {
        Duration::from_secs(2)
    }
}

/// Submit and poll one remote skill invocation.
pub async fn run_remote_skill(
    engine: &dyn WorkflowEngine,
    workflow_id: &str,
    input: Value,
) -> Result<Value, SkillError> {
    let run_id = engine.submit(workflow_id, input).await?;
    debug!(workflow_id, %run_id, "remote skill submitted");

    for attempt in 1..=engine.max_poll_attempts() {
        let run = engine.get_run(&run_id).await?;
        match run.status {
            WorkflowStatus::Finished => {
                return Ok(run.output.unwrap_or(Value::Null));
            }
            WorkflowStatus::Failed => {
                let reason = run.error.unwrap_or_else(|| "unspecified".to_string());
                warn!(workflow_id, %run_id, %reason, "remote skill failed");
                return Err(SkillError::backend(format!(
                    "workflow {workflow_id} failed: {reason}"
                )));
            }
            WorkflowStatus::Executing => {
                if attempt < engine.max_poll_attempts() {
                    tokio::time::sleep(engine.poll_interval()).await;
                }
            }
        }
    }

    Err(SkillError::timeout(format!(
        "workflow {workflow_id} still executing after {} poll attempts",
        engine.max_poll_attempts()
    )))
}

/// HTTP client for the workflow engine's REST surface.
pub struct HttpWorkflowEngine {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
    max_poll_attempts: usize,
    poll_interval: Duration,
}

impl HttpWorkflowEngine {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
            max_poll_attempts: 10,
            poll_interval: Duration::from_secs(2),
        }
    }

    pub fn with_polling(mut self, max_poll_attempts: usize, poll_interval: Duration) -> Self {
        self.max_poll_attempts = max_poll_attempts;
        self.poll_interval = poll_interval;
        self
    }
}

#[async_trait]
impl WorkflowEngine for HttpWorkflowEngine {
    async fn submit(&self, workflow_id: &str, input: Value) -> Result<String, SkillError> {
        let url = format!("{}/v1/workflows/{}/runs", self.base_url, workflow_id);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({"input": input}))
            .send()
            .await
            .map_err(|e| SkillError::backend(format!("submit failed: {e}")))?;

        if response.status().as_u16() == 404 {
            return Err(SkillError::not_found(format!("workflow {workflow_id}")));
        }
        if !response.status().is_success() {
            let status = response.status();
            return Err(SkillError::backend(format!("submit returned {status}")));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SkillError::backend(format!("submit response unreadable: {e}")))?;
        body["run_id"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| SkillError::backend("submit response carried no run id"))
    }

    async fn get_run(&self, run_id: &str) -> Result<WorkflowRun, SkillError> {
        let url = format!("{}/v1/runs/{}", self.base_url, run_id);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| SkillError::backend(format!("poll failed: {e}")))?;

        if response.status().as_u16() == 404 {
            return Err(SkillError::not_found(format!("run {run_id}")));
        }
        if !response.status().is_success() {
            let status = response.status();
            return Err(SkillError::backend(format!("poll returned {status}")));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SkillError::backend(format!("poll response unreadable: {e}")))?;
        let status = match body["status"].as_str() {
            Some("finish") | Some("finished") | Some("succeeded") => WorkflowStatus::Finished,
            Some("failed") | Some("error") => WorkflowStatus::Failed,
            _ => WorkflowStatus::Executing,
        };
        Ok(WorkflowRun {
            status,
            output: body.get("output").cloned(),
            error: body["error"].as_str().map(String::from),
        })
    }

    fn max_poll_attempts(&self) -> usize {
        self.max_poll_attempts
    }

    fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}
