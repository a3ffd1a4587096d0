//! The skill registry.
//!
//! Built once at startup, read-only afterwards. Registration refuses
//! duplicate ids, uncompilable schemas, and backend metadata that does not
//! match the declared backend.

use crate::schema::{SkillBackend, SkillRegistration, SkillSpec};
use jsonschema::JSONSchema;
use review_core::{ReviewError, Result, ToolDefinition};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Read-only map from skill id to registration.
#[derive(Default)]
pub struct SkillRegistry {
    skills: BTreeMap<String, Arc<SkillRegistration>>,
}

impl SkillRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a skill. Fails when the id is taken, a schema does not
    /// compile, or the backend metadata is inconsistent.
    pub fn register(&mut self, spec: SkillSpec) -> Result<()> {
        if self.skills.contains_key(&spec.skill_id) {
            return Err(ReviewError::Validation(format!(
                "skill {} is already registered",
                spec.skill_id
            )));
        }
        match spec.backend {
            SkillBackend::Local => {
                if spec.handler.is_none() {
                    return Err(ReviewError::Validation(format!(
                        "local skill {} requires a handler",
                        spec.skill_id
                    )));
                }
                if spec.remote_workflow_id.is_some() {
                    return Err(ReviewError::Validation(format!(
                        "local skill {} must not carry a remote workflow id",
                        spec.skill_id
                    )));
                }
            }
            SkillBackend::Remote => {
                if spec.remote_workflow_id.is_none() {
                    return Err(ReviewError::Validation(format!(
                        "remote skill {} requires a workflow id",
                        spec.skill_id
                    )));
                }
                if spec.handler.is_some() {
                    return Err(ReviewError::Validation(format!(
                        "remote skill {} must not carry a local handler",
                        spec.skill_id
                    )));
                }
            }
        }

        let compiled_input = JSONSchema::compile(&spec.input_schema).map_err(|e| {
            ReviewError::Validation(format!("skill {}: bad input schema: {e}", spec.skill_id))
        })?;
        let compiled_output = JSONSchema::compile(&spec.output_schema).map_err(|e| {
            ReviewError::Validation(format!("skill {}: bad output schema: {e}", spec.skill_id))
        })?;

        info!(skill_id = %spec.skill_id, backend = spec.backend.as_str(), "skill registered");
        self.skills.insert(
            spec.skill_id.clone(),
            Arc::new(SkillRegistration {
                skill_id: spec.skill_id,
                name: spec.name,
                description: spec.description,
                input_schema: spec.input_schema,
                output_schema: spec.output_schema,
                backend: spec.backend,
                handler: spec.handler,
                remote_workflow_id: spec.remote_workflow_id,
                domain: spec.domain,
                timeout_ms: spec.timeout_ms,
                compiled_input,
                compiled_output,
            }),
        );
        Ok(())
    }

    pub fn get(&self, skill_id: &str) -> Option<Arc<SkillRegistration>> {
        self.skills.get(skill_id).cloned()
    }

    pub fn skill_ids(&self) -> Vec<String> {
        self.skills.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    /// All registrations, for introspection endpoints.
    pub fn list(&self) -> Vec<Arc<SkillRegistration>> {
        self.skills.values().cloned().collect()
    }

    /// Registrations visible to a domain.
    pub fn by_domain(&self, domain_id: &str) -> Vec<Arc<SkillRegistration>> {
        self.skills
            .values()
            .filter(|r| r.visible_to(domain_id))
            .cloned()
            .collect()
    }

    /// Export provider-neutral tool schemas for a domain, optionally
    /// narrowed to a clause's skill list (the default toolset is always
    /// included so the agent can at least fetch context).
    pub fn tool_definitions(&self, domain_id: &str, narrowed: &[String]) -> Vec<ToolDefinition> {
        self.skills
            .values()
            .filter(|r| r.visible_to(domain_id))
            .filter(|r| {
                narrowed.is_empty()
                    || narrowed.iter().any(|id| id == &r.skill_id)
                    || DEFAULT_TOOLSET.contains(&r.skill_id.as_str())
            })
            .map(|r| r.tool_definition())
            .collect()
    }
}

/// Skills every clause gets regardless of its checklist entry.
pub const DEFAULT_TOOLSET: &[&str] = &["get_clause_context"];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::SkillResources;
    use crate::schema::SkillHandler;
    use async_trait::async_trait;
    use review_core::react::SkillInvocation;
    use serde_json::{json, Value};

    struct Echo;

    #[async_trait]
    impl SkillHandler for Echo {
        async fn run(
            &self,
            input: Value,
            _resources: &SkillResources,
            _invocation: &SkillInvocation,
        ) -> std::result::Result<Value, String> {
            Ok(json!({"echo": input["message"]}))
        }
    }

    fn echo_spec(skill_id: &str) -> SkillSpec {
        SkillSpec::local(
            skill_id,
            "Echo the message back",
            json!({
                "type": "object",
                "properties": {"message": {"type": "string"}},
                "required": ["message"]
            }),
            json!({"type": "object"}),
            Arc::new(Echo),
        )
    }

    #[test]
    fn register_and_lookup() {
        let mut registry = SkillRegistry::new();
        registry.register(echo_spec("echo")).unwrap();
        assert!(registry.get("echo").is_some());
        assert!(registry.get("missing").is_none());
        assert_eq!(registry.skill_ids(), vec!["echo".to_string()]);
    }

    #[test]
    fn duplicate_id_rejected() {
        let mut registry = SkillRegistry::new();
        registry.register(echo_spec("echo")).unwrap();
        let err = registry.register(echo_spec("echo")).unwrap_err();
        assert!(err.to_string().contains("already registered"));
    }

    #[test]
    fn local_without_handler_rejected() {
        let mut registry = SkillRegistry::new();
        let mut spec = echo_spec("broken");
        spec.handler = None;
        let err = registry.register(spec).unwrap_err();
        assert!(err.to_string().contains("requires a handler"));
    }

    #[test]
    fn remote_without_workflow_id_rejected() {
        let mut registry = SkillRegistry::new();
        let mut spec = SkillSpec::remote(
            "remote_check",
            "Remote analyzer",
            json!({"type": "object"}),
            json!({"type": "object"}),
            "wf_123",
        );
        spec.remote_workflow_id = None;
        let err = registry.register(spec).unwrap_err();
        assert!(err.to_string().contains("requires a workflow id"));
    }

    #[test]
    fn backend_metadata_must_be_consistent() {
        let mut registry = SkillRegistry::new();
        let mut spec = echo_spec("confused");
        spec.remote_workflow_id = Some("wf_9".to_string());
        let err = registry.register(spec).unwrap_err();
        assert!(err.to_string().contains("must not carry a remote workflow id"));
    }

    #[test]
    fn invalid_schema_rejected() {
        let mut registry = SkillRegistry::new();
        let mut spec = echo_spec("bad_schema");
        spec.input_schema = json!({"type": "not-a-type"});
        assert!(registry.register(spec).is_err());
    }

    #[test]
    fn domain_scoping() {
        let mut registry = SkillRegistry::new();
        registry.register(echo_spec("everywhere")).unwrap();
        registry
            .register(echo_spec("construction_only").with_domain("construction"))
            .unwrap();

        assert_eq!(registry.by_domain("construction").len(), 2);
        assert_eq!(registry.by_domain("finance").len(), 1);
    }

    #[test]
    fn tool_definitions_narrowed_but_default_kept() {
        let mut registry = SkillRegistry::new();
        registry.register(echo_spec("get_clause_context")).unwrap();
        registry.register(echo_spec("compare_with_baseline")).unwrap();
        registry.register(echo_spec("unrelated")).unwrap();

        let tools =
            registry.tool_definitions("construction", &["compare_with_baseline".to_string()]);
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert!(names.contains(&"compare_with_baseline"));
        assert!(names.contains(&"get_clause_context"));
        assert!(!names.contains(&"unrelated"));

        // Empty narrowing exposes everything in the domain.
        assert_eq!(registry.tool_definitions("construction", &[]).len(), 3);
    }
}
