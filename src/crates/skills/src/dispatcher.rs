//! The skill dispatcher.
//!
//! One dispatcher exists per review task. It holds the shared registry,
//! the task's parsed documents, and the remote engine client, and
//! implements the `SkillExecutor` seam the agent loop talks to.

use crate::error::{SkillError, SkillErrorKind};
use crate::registry::SkillRegistry;
use crate::remote::WorkflowEngine;
use crate::schema::{SkillBackend, SkillRegistration};
use async_trait::async_trait;
use parser::ClauseTree;
use review_core::react::{SkillExecutor, SkillInvocation, SkillResult};
use review_core::ToolDefinition;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Parsed documents a task's skills operate on.
#[derive(Default)]
pub struct SkillResources {
    pub primary: Option<Arc<ClauseTree>>,
    pub baseline: Option<Arc<ClauseTree>>,
    pub reference: Vec<Arc<ClauseTree>>,
}

impl SkillResources {
    pub fn with_primary(primary: Arc<ClauseTree>) -> Self {
        Self {
            primary: Some(primary),
            baseline: None,
            reference: Vec::new(),
        }
    }
}

/// Validates, executes, and times skill invocations.
pub struct SkillDispatcher {
    registry: Arc<SkillRegistry>,
    resources: Arc<SkillResources>,
    engine: Option<Arc<dyn WorkflowEngine>>,
}

impl SkillDispatcher {
    pub fn new(registry: Arc<SkillRegistry>, resources: Arc<SkillResources>) -> Self {
        Self {
            registry,
            resources,
            engine: None,
        }
    }

    pub fn with_engine(mut self, engine: Arc<dyn WorkflowEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn registry(&self) -> &SkillRegistry {
        &self.registry
    }

    async fn run_backend(
        &self,
        registration: &SkillRegistration,
        input: Value,
        invocation: &SkillInvocation,
    ) -> Result<Value, SkillError> {
        match registration.backend {
            SkillBackend::Local => {
                let handler = registration.handler.as_ref().ok_or_else(|| {
                    SkillError::new(SkillErrorKind::Internal, "local skill without handler")
                })?;
                handler
                    .run(input, &self.resources, invocation)
                    .await
                    .map_err(|message| SkillError::new(SkillErrorKind::Internal, message))
            }
            SkillBackend::Remote => {
                let engine = self.engine.as_ref().ok_or_else(|| {
                    SkillError::new(
                        SkillErrorKind::Internal,
                        "no workflow engine configured for remote skills",
                    )
                })?;
                let workflow_id = registration.remote_workflow_id.as_deref().ok_or_else(|| {
                    SkillError::new(SkillErrorKind::Internal, "remote skill without workflow id")
                })?;
                crate::remote::run_remote_skill(engine.as_ref(), workflow_id, input).await
            }
        }
    }
}

#[async_trait]
impl SkillExecutor for SkillDispatcher {
    fn tool_definitions(&self, domain_id: &str, skill_ids: &[String]) -> Vec<ToolDefinition> {
        self.registry.tool_definitions(domain_id, skill_ids)
    }

    async fn dispatch(&self, skill_id: &str, input: Value, invocation: &SkillInvocation) -> SkillResult {
        let started = Instant::now();
        let elapsed = |started: Instant| started.elapsed().as_millis() as u64;

        let Some(registration) = self.registry.get(skill_id) else {
            return SkillResult::err(skill_id, "not_found: skill is not registered", 0);
        };

        if let Err(errors) = validate(&registration.compiled_input, &input) {
            return SkillResult::err(
                skill_id,
                format!("schema_violation: input validation failed: {errors}"),
                elapsed(started),
            );
        }

        let budget = Duration::from_millis(registration.timeout_ms);
        let outcome =
            tokio::time::timeout(budget, self.run_backend(&registration, input, invocation)).await;

        let output = match outcome {
            Err(_) => {
                warn!(skill_id, timeout_ms = registration.timeout_ms, "skill timed out");
                return SkillResult::err(
                    skill_id,
                    format!("timeout: exceeded {} ms budget", registration.timeout_ms),
                    elapsed(started),
                );
            }
            Ok(Err(err)) => {
                warn!(skill_id, %err, "skill failed");
                return SkillResult::err(skill_id, err.to_string(), elapsed(started));
            }
            Ok(Ok(output)) => output,
        };

        if let Err(errors) = validate(&registration.compiled_output, &output) {
            return SkillResult::err(
                skill_id,
                format!("schema_violation: output validation failed: {errors}"),
                elapsed(started),
            );
        }

        debug!(skill_id, clause_id = %invocation.clause_id, "skill succeeded");
        SkillResult::ok(skill_id, output, elapsed(started))
    }
}

fn validate(schema: &jsonschema::JSONSchema, instance: &Value) -> Result<(), String> {
    let result = schema.validate(instance);
    match result {
        Ok(()) => Ok(()),
        Err(errors) => {
            let joined: Vec<String> = errors.take(3).map(|e| e.to_string()).collect();
            Err(joined.join("; "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{SkillHandler, SkillSpec};
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl SkillHandler for Echo {
        async fn run(
            &self,
            input: Value,
            _resources: &SkillResources,
            _invocation: &SkillInvocation,
        ) -> Result<Value, String> {
            Ok(json!({"echo": format!("ECHO: {}", input["message"].as_str().unwrap_or(""))}))
        }
    }

    struct Slow;

    #[async_trait]
    impl SkillHandler for Slow {
        async fn run(
            &self,
            _input: Value,
            _resources: &SkillResources,
            _invocation: &SkillInvocation,
        ) -> Result<Value, String> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(json!({}))
        }
    }

    struct WrongShape;

    #[async_trait]
    impl SkillHandler for WrongShape {
        async fn run(
            &self,
            _input: Value,
            _resources: &SkillResources,
            _invocation: &SkillInvocation,
        ) -> Result<Value, String> {
            Ok(json!({"unexpected": true}))
        }
    }

    fn invocation() -> SkillInvocation {
        SkillInvocation {
            task_id: "t1".to_string(),
            clause_id: "1.1".to_string(),
            domain_id: "construction".to_string(),
            language: "en".to_string(),
        }
    }

    fn dispatcher_with(specs: Vec<SkillSpec>) -> SkillDispatcher {
        let mut registry = SkillRegistry::new();
        for spec in specs {
            registry.register(spec).unwrap();
        }
        SkillDispatcher::new(Arc::new(registry), Arc::new(SkillResources::default()))
    }

    fn echo_spec() -> SkillSpec {
        SkillSpec::local(
            "echo",
            "Echo the message back",
            json!({
                "type": "object",
                "properties": {"message": {"type": "string"}},
                "required": ["message"]
            }),
            json!({
                "type": "object",
                "properties": {"echo": {"type": "string"}},
                "required": ["echo"]
            }),
            Arc::new(Echo),
        )
    }

    #[tokio::test]
    async fn call_local_skill() {
        let dispatcher = dispatcher_with(vec![echo_spec()]);
        let result = dispatcher
            .dispatch("echo", json!({"message": "hello"}), &invocation())
            .await;
        assert!(result.success);
        assert_eq!(result.data.unwrap()["echo"], "ECHO: hello");
    }

    #[tokio::test]
    async fn unregistered_skill_is_an_error_result() {
        let dispatcher = dispatcher_with(vec![]);
        let result = dispatcher.dispatch("nope", json!({}), &invocation()).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("not_found"));
    }

    #[tokio::test]
    async fn input_schema_enforced() {
        let dispatcher = dispatcher_with(vec![echo_spec()]);
        // message is required and must be a string
        let result = dispatcher
            .dispatch("echo", json!({"message": 42}), &invocation())
            .await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("input validation failed"));
    }

    #[tokio::test]
    async fn output_schema_enforced() {
        let spec = SkillSpec::local(
            "wrong_shape",
            "Returns the wrong shape",
            json!({"type": "object"}),
            json!({
                "type": "object",
                "properties": {"echo": {"type": "string"}},
                "required": ["echo"]
            }),
            Arc::new(WrongShape),
        );
        let dispatcher = dispatcher_with(vec![spec]);
        let result = dispatcher.dispatch("wrong_shape", json!({}), &invocation()).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("output validation failed"));
    }

    #[tokio::test]
    async fn time_budget_enforced() {
        let spec = SkillSpec::local(
            "slow",
            "Sleeps past its budget",
            json!({"type": "object"}),
            json!({"type": "object"}),
            Arc::new(Slow),
        )
        .with_timeout_ms(20);
        let dispatcher = dispatcher_with(vec![spec]);
        let result = dispatcher.dispatch("slow", json!({}), &invocation()).await;
        assert!(!result.success);
        assert!(result.error.unwrap().starts_with("timeout"));
    }

    #[tokio::test]
    async fn timing_is_recorded() {
        let dispatcher = dispatcher_with(vec![echo_spec()]);
        let result = dispatcher
            .dispatch("echo", json!({"message": "x"}), &invocation())
            .await;
        assert!(result.success);
        // elapsed_ms is set (possibly 0 on a fast machine)
        let _ = result.elapsed_ms;
    }
}
