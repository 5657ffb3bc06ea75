use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};

use crate::backend::extract::{ApiJson, ApiQuery};
use crate::backend::schemas::{HistoryBody, HistoryResponse, StatsQuery, StatsResponse};
use crate::backend::state::AppState;
use crate::db::stats::Recorded;
use crate::error::AppError;

pub async fn list_history(
    State(state): State<Arc<AppState>>,
) -> Result<Json<HistoryResponse>, AppError> {
    let history = state.history.list().await?;
    Ok(Json(HistoryResponse { history }))
}

pub async fn add_history(
    State(state): State<Arc<AppState>>,
    ApiJson(body): ApiJson<HistoryBody>,
) -> Result<Json<Value>, AppError> {
    let count = state.history.append(body.into_entry()).await?;
    Ok(Json(json!({ "status": "ok", "count": count })))
}

pub async fn get_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<StatsResponse>, AppError> {
    let stats = state.stats.load().await?;
    Ok(Json(StatsResponse {
        stats,
        server_uptime: state.uptime_secs(),
    }))
}

pub async fn record_stats(
    State(state): State<Arc<AppState>>,
    ApiQuery(query): ApiQuery<StatsQuery>,
) -> Result<Json<StatsResponse>, AppError> {
    let outcome = if query.success {
        Recorded::Success {
            used_fallback: query.fallback,
        }
    } else {
        Recorded::Failure
    };
    let stats = state.stats.record(outcome).await?;
    Ok(Json(StatsResponse {
        stats,
        server_uptime: state.uptime_secs(),
    }))
}
