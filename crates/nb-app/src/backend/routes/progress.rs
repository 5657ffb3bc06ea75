use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use nb_core::{ProgressStore, ProgressUpdate};
use serde_json::{Value, json};
use tracing::info;

use crate::backend::state::AppState;
use crate::error::AppError;

pub async fn get_progress(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<Json<ProgressUpdate>, AppError> {
    state
        .progress_of(&task_id)
        .map(Json)
        .ok_or(AppError::TaskNotFound(task_id))
}

/// Cancels a running task, or forgets the record of a finished one.
pub async fn cancel_task(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    if state.cancel(&task_id) {
        info!(%task_id, "cancellation requested");
        return Ok(Json(json!({ "task_id": task_id, "status": "cancelling" })));
    }
    match state.progress.remove(&task_id) {
        Some(_) => Ok(Json(json!({ "task_id": task_id, "status": "removed" }))),
        None => Err(AppError::TaskNotFound(task_id)),
    }
}
