//! Domain plugin introspection.

use crate::api::error::{ApiError, ApiResult};
use crate::api::routes::AppState;
use axum::extract::{Path, State};
use axum::Json;
use serde_json::{json, Value};

pub async fn list_domains(State(state): State<AppState>) -> Json<Value> {
    let domains: Vec<Value> = state
        .plugins
        .list()
        .iter()
        .map(|p| {
            json!({
                "domain_id": p.domain_id,
                "name": p.name,
                "supported_subtypes": p.supported_subtypes,
                "checklist_size": p.checklist.len(),
            })
        })
        .collect();
    Json(json!({"domains": domains}))
}

pub async fn get_domain(
    State(state): State<AppState>,
    Path(domain_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let plugin = state
        .plugins
        .get(&domain_id)
        .ok_or_else(|| ApiError::NotFound(format!("domain {domain_id}")))?;
    Ok(Json(json!({
        "domain_id": plugin.domain_id,
        "name": plugin.name,
        "supported_subtypes": plugin.supported_subtypes,
        "parser_config": {
            "structure_type": plugin.parser_config.structure_type,
            "definitions_section_id": plugin.parser_config.definitions_section_id,
            "max_depth": plugin.parser_config.max_depth,
        },
        "review_checklist": plugin.checklist,
        "preferred_skills": plugin.preferred_skills,
    })))
}
