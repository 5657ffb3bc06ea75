use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use chrono::Utc;
use futures::{StreamExt, stream};
use nb_core::{CancelSignal, GenerationError, GenerationRequest, truncate_for_log};
use tracing::{info, warn};
use uuid::Uuid;

use crate::backend::extract::ApiJson;
use crate::backend::schemas::{
    BatchBody, BatchItem, BatchResponse, BatchStatus, GenerationBody, GenerationResponse,
    ImageData, TaskCreated,
};
use crate::backend::state::AppState;
use crate::error::AppError;

pub async fn create_image(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<GenerationBody>,
) -> Result<Json<GenerationResponse>, AppError> {
    let seed = body.seed_image();
    info!(
        prompt = %truncate_for_log(&body.prompt, 50),
        image_url = ?seed,
        "received image generation request"
    );
    let request = GenerationRequest::new(body.prompt, seed)?;

    let outcome = match body.task_id.as_deref() {
        Some(task_id) => {
            let Some(tracked) = state.track(task_id) else {
                return Err(already_running(task_id));
            };
            let result = state
                .generate(&request, &state.task_sink(task_id), &tracked.cancel)
                .await;
            state.untrack(task_id, &tracked);
            result?
        }
        None => {
            state
                .generate(&request, &(), &CancelSignal::never())
                .await?
        }
    };

    Ok(Json(GenerationResponse {
        created: Utc::now().timestamp(),
        data: vec![ImageData {
            url: outcome.final_asset_reference,
            revised_prompt: request.prompt().to_string(),
        }],
    }))
}

/// Starts a lifecycle in the background; its progress and final url are
/// read from the progress endpoint.
pub async fn start_task(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<GenerationBody>,
) -> Result<(StatusCode, Json<TaskCreated>), AppError> {
    let request = GenerationRequest::new(body.prompt.as_str(), body.seed_image())?;
    let task_id = body
        .task_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let Some(tracked) = state.track(&task_id) else {
        return Err(already_running(&task_id));
    };

    tokio::spawn({
        let state = state.clone();
        let task_id = task_id.clone();
        async move {
            let sink = state.task_sink(&task_id);
            if let Err(err) = state.generate(&request, &sink, &tracked.cancel).await {
                warn!(%task_id, "background generation failed: {}", err);
            }
            state.untrack(&task_id, &tracked);
        }
    });

    info!(%task_id, "queued background generation");
    Ok((StatusCode::ACCEPTED, Json(TaskCreated { task_id })))
}

pub async fn run_batch(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<BatchBody>,
) -> Result<Json<BatchResponse>, AppError> {
    if body.prompts.is_empty() {
        return Err(AppError::BadRequest("prompts cannot be empty".into()));
    }
    info!(
        prompts = body.prompts.len(),
        concurrency = state.batch_concurrency,
        "starting batch generation"
    );

    let seed = body.seed_image();
    let results: Vec<BatchItem> = stream::iter(body.prompts)
        .map(|prompt| batch_item(&state, prompt, seed.clone()))
        .buffered(state.batch_concurrency)
        .collect()
        .await;

    let response = BatchResponse::from_results(results);
    info!(
        successful = response.successful,
        failed = response.failed,
        "batch generation finished"
    );
    Ok(Json(response))
}

fn already_running(task_id: &str) -> AppError {
    AppError::BadRequest(format!("Task {task_id} is already running"))
}

async fn batch_item(state: &AppState, prompt: String, seed: Option<String>) -> BatchItem {
    let result = match GenerationRequest::new(prompt.as_str(), seed) {
        Ok(request) => {
            state
                .generate(&request, &(), &CancelSignal::never())
                .await
        }
        Err(err) => Err(GenerationError::from(err)),
    };

    match result {
        Ok(outcome) => BatchItem {
            prompt,
            url: Some(outcome.final_asset_reference),
            status: BatchStatus::Success,
            error: None,
        },
        Err(err) => BatchItem {
            prompt,
            url: None,
            status: BatchStatus::Failed,
            error: Some(err.to_string()),
        },
    }
}
