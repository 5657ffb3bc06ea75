use axum::Json;
use serde_json::{Value, json};

pub const SERVICE_NAME: &str = "Nano Banana Image Generation API";

pub async fn api_info() -> Json<Value> {
    Json(json!({
        "message": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Generate images from text prompts and re-host them on public file hosts",
        "endpoints": {
            "POST /v1/image/generations": "Generate image from prompt",
            "POST /v1/image/tasks": "Start a background generation",
            "POST /v1/image/batch": "Generate images for several prompts",
            "GET /v1/progress/{task_id}": "Progress of a generation",
            "GET /v1/history": "Recent generations",
            "GET /v1/stats": "Generation counters",
            "POST /upload": "Re-host a local image",
            "GET /health": "Health check"
        }
    }))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy", "service": SERVICE_NAME }))
}
