//! Skill registration schema.

use crate::dispatcher::SkillResources;
use async_trait::async_trait;
use jsonschema::JSONSchema;
use review_core::react::SkillInvocation;
use review_core::ToolDefinition;
use serde_json::Value;
use std::sync::Arc;

/// Which backend executes a skill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkillBackend {
    /// In-process handler.
    Local,
    /// Remote workflow engine, submitted and polled by id.
    Remote,
}

impl SkillBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkillBackend::Local => "local",
            SkillBackend::Remote => "remote",
        }
    }
}

/// In-process skill implementation.
///
/// Errors are returned as strings; the dispatcher wraps them into the
/// uniform result. Handlers must not panic on odd input; the input has
/// already passed schema validation, but resource lookups can still miss.
#[async_trait]
pub trait SkillHandler: Send + Sync {
    async fn run(
        &self,
        input: Value,
        resources: &SkillResources,
        invocation: &SkillInvocation,
    ) -> Result<Value, String>;
}

/// A registered skill.
pub struct SkillRegistration {
    pub skill_id: String,
    pub name: String,
    pub description: String,
    /// JSON Schema for the input object.
    pub input_schema: Value,
    /// JSON Schema for the output object.
    pub output_schema: Value,
    pub backend: SkillBackend,
    /// Present iff `backend == Local`.
    pub handler: Option<Arc<dyn SkillHandler>>,
    /// Present iff `backend == Remote`.
    pub remote_workflow_id: Option<String>,
    /// `None` means visible to every domain.
    pub domain: Option<String>,
    /// Per-invocation time budget in milliseconds.
    pub timeout_ms: u64,
    pub(crate) compiled_input: JSONSchema,
    pub(crate) compiled_output: JSONSchema,
}

impl SkillRegistration {
    /// Provider-neutral tool schema for this skill.
    pub fn tool_definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            self.skill_id.clone(),
            self.description.clone(),
            self.input_schema.clone(),
        )
    }

    /// Whether this skill is visible to a domain.
    pub fn visible_to(&self, domain_id: &str) -> bool {
        match &self.domain {
            None => true,
            Some(scoped) => scoped == domain_id,
        }
    }
}

impl std::fmt::Debug for SkillRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkillRegistration")
            .field("skill_id", &self.skill_id)
            .field("backend", &self.backend)
            .field("domain", &self.domain)
            .finish()
    }
}

/// Builder for registrations; the registry compiles and checks it.
pub struct SkillSpec {
    pub skill_id: String,
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub output_schema: Value,
    pub backend: SkillBackend,
    pub handler: Option<Arc<dyn SkillHandler>>,
    pub remote_workflow_id: Option<String>,
    pub domain: Option<String>,
    pub timeout_ms: u64,
}

impl SkillSpec {
    pub fn local(
        skill_id: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        output_schema: Value,
        handler: Arc<dyn SkillHandler>,
    ) -> Self {
        let skill_id = skill_id.into();
        Self {
            name: skill_id.clone(),
            skill_id,
            description: description.into(),
            input_schema,
            output_schema,
            backend: SkillBackend::Local,
            handler: Some(handler),
            remote_workflow_id: None,
            domain: None,
            timeout_ms: 30_000,
        }
    }

    pub fn remote(
        skill_id: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        output_schema: Value,
        workflow_id: impl Into<String>,
    ) -> Self {
        let skill_id = skill_id.into();
        Self {
            name: skill_id.clone(),
            skill_id,
            description: description.into(),
            input_schema,
            output_schema,
            backend: SkillBackend::Remote,
            handler: None,
            remote_workflow_id: Some(workflow_id.into()),
            domain: None,
            timeout_ms: 120_000,
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}
