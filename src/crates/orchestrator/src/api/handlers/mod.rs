//! Request handlers.

pub mod domains;
pub mod health;
pub mod review;
pub mod skills;

use crate::api::error::ApiError;
use crate::api::routes::AppState;

/// Make sure the task is live and owned by the caller. Rehydrates from
/// the session store when the process restarted under the task.
pub(crate) async fn authorize_task(
    state: &AppState,
    task_id: &str,
    user_id: &str,
) -> Result<(), ApiError> {
    state.runner.ensure_active(task_id).await?;
    match state.runner.owner(task_id).await {
        Some(owner) if owner == user_id => Ok(()),
        Some(_) => Err(ApiError::Forbidden("task belongs to another user".to_string())),
        None => Err(ApiError::NotFound(format!("task {task_id}"))),
    }
}
