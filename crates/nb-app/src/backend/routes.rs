use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};

use crate::backend::routes::generation::{create_image, run_batch, start_task};
use crate::backend::routes::info::{api_info, health};
use crate::backend::routes::progress::{cancel_task, get_progress};
use crate::backend::routes::records::{add_history, get_stats, list_history, record_stats};
use crate::backend::routes::upload::{MAX_UPLOAD_BYTES, upload_image};
use crate::backend::state::AppState;

mod generation;
mod info;
mod progress;
mod records;
mod upload;

pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(api_info))
        .route("/health", get(health))
        .route("/v1/image/generations", post(create_image))
        .route("/v1/image/tasks", post(start_task))
        .route("/v1/image/batch", post(run_batch))
        .route(
            "/v1/progress/{task_id}",
            get(get_progress).delete(cancel_task),
        )
        .route("/v1/history", get(list_history).post(add_history))
        .route("/v1/stats", get(get_stats).post(record_stats))
        .route(
            "/upload",
            post(upload_image).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
}
