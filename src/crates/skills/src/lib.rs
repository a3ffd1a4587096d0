//! Skills: named, typed capabilities callable by the agent loop.
//!
//! A skill is registered once at startup with input/output JSON schemas and
//! a backend: an in-process handler or a remote workflow id. The
//! dispatcher validates inputs and outputs against the schemas, runs the
//! backend under a time budget, and returns a uniform result. Skill
//! failures are recorded, never fatal: the agent loop decides what to do
//! next.

pub mod dispatcher;
pub mod error;
pub mod local;
pub mod registry;
pub mod remote;
pub mod schema;

pub use dispatcher::{SkillDispatcher, SkillResources};
pub use error::{SkillError, SkillErrorKind};
pub use local::register_builtin_skills;
pub use registry::SkillRegistry;
pub use remote::{HttpWorkflowEngine, WorkflowEngine, WorkflowRun, WorkflowStatus};
pub use schema::{SkillBackend, SkillHandler, SkillRegistration, SkillSpec};
