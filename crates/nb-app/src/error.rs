use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use nb_core::{GenerationError, RelayError, ValidationError};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{0}")]
    BadRequest(String),
    #[error("Task {0} not found")]
    TaskNotFound(String),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Relay(#[from] RelayError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Generation(GenerationError::Validation(_)) => StatusCode::BAD_REQUEST,
            Self::TaskNotFound(_) => StatusCode::NOT_FOUND,
            Self::Relay(RelayError::PayloadTooSmall(_)) => StatusCode::BAD_REQUEST,
            Self::Relay(_) => StatusCode::BAD_GATEWAY,
            Self::Generation(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("request failed: {}", self);
        }
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::from(ValidationError::EmptyPrompt).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::TaskNotFound("t".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::from(RelayError::Exhausted).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::from(RelayError::PayloadTooSmall(12)).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(anyhow::anyhow!("disk full")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
