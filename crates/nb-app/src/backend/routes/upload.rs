use std::sync::Arc;

use axum::Json;
use axum::extract::{Multipart, State};
use nb_core::relay::Asset;
use tracing::info;

use crate::backend::schemas::UploadResponse;
use crate::backend::state::AppState;
use crate::error::AppError;

pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Re-hosts a local image through the same relay services used for
/// generated results.
pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::BadRequest(err.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|err| AppError::BadRequest(err.body_text()))?;

        let asset = Asset::named(file_name.as_deref(), bytes.to_vec());
        info!(file = %asset.file_name, bytes = asset.bytes.len(), "uploading local image");
        let url = state.orchestrator.relay().upload(&asset).await?;
        return Ok(Json(UploadResponse { url }));
    }
    Err(AppError::BadRequest("missing multipart field `file`".into()))
}
