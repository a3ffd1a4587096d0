//! Skill registry introspection.

use crate::api::error::{ApiError, ApiResult};
use crate::api::routes::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use skills::SkillRegistration;
use std::sync::Arc;

fn skill_row(registration: &SkillRegistration) -> Value {
    json!({
        "skill_id": registration.skill_id,
        "name": registration.name,
        "description": registration.description,
        "backend": registration.backend.as_str(),
        "domain": registration.domain.clone().unwrap_or_else(|| "*".to_string()),
        "status": "active",
        "is_registered": true,
    })
}

#[derive(Debug, Deserialize)]
pub struct SkillListParams {
    #[serde(default)]
    pub domain_id: Option<String>,
}

pub async fn list_skills(
    State(state): State<AppState>,
    Query(params): Query<SkillListParams>,
) -> Json<Value> {
    let registrations: Vec<Arc<SkillRegistration>> = match &params.domain_id {
        Some(domain_id) => state.skills.by_domain(domain_id),
        None => state.skills.list(),
    };

    let mut by_domain: Map<String, Value> = Map::new();
    let mut by_backend: Map<String, Value> = Map::new();
    for registration in &registrations {
        let domain = registration.domain.clone().unwrap_or_else(|| "*".to_string());
        let count = by_domain.get(&domain).and_then(Value::as_u64).unwrap_or(0);
        by_domain.insert(domain, (count + 1).into());
        let backend = registration.backend.as_str().to_string();
        let count = by_backend.get(&backend).and_then(Value::as_u64).unwrap_or(0);
        by_backend.insert(backend, (count + 1).into());
    }

    let rows: Vec<Value> = registrations.iter().map(|r| skill_row(r)).collect();
    Json(json!({
        "skills": rows,
        "total": rows.len(),
        "by_domain": by_domain,
        "by_backend": by_backend,
    }))
}

pub async fn get_skill(
    State(state): State<AppState>,
    Path(skill_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let registration = state
        .skills
        .get(&skill_id)
        .ok_or_else(|| ApiError::NotFound(format!("skill {skill_id}")))?;

    // Which checklist items across all domains name this skill.
    let mut used_by: Vec<String> = Vec::new();
    for plugin in state.plugins.list() {
        for item in &plugin.checklist {
            if item.required_skills.contains(&skill_id)
                || item.suggested_skills.contains(&skill_id)
            {
                used_by.push(item.clause_id.clone());
            }
        }
    }
    used_by.sort();
    used_by.dedup();

    let mut row = skill_row(&registration);
    if let Value::Object(map) = &mut row {
        map.insert("input_schema".to_string(), registration.input_schema.clone());
        map.insert("output_schema".to_string(), registration.output_schema.clone());
        map.insert("timeout_ms".to_string(), registration.timeout_ms.into());
        map.insert("used_by_checklist_items".to_string(), json!(used_by));
    }
    Ok(Json(row))
}

pub async fn skills_by_domain(
    State(state): State<AppState>,
    Path(domain_id): Path<String>,
) -> Json<Value> {
    let rows: Vec<Value> = state
        .skills
        .by_domain(&domain_id)
        .iter()
        .map(|r| skill_row(r))
        .collect();
    Json(json!({
        "domain_id": domain_id,
        "skills": rows,
        "total": rows.len(),
    }))
}
