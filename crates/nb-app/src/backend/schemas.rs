use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::db::{GenerationStats, HistoryEntry};

/// `image_url` wins over the `imageReference` spelling when both are sent.
fn pick_image(image_url: &Option<String>, image_reference: &Option<String>) -> Option<String> {
    image_url
        .as_ref()
        .filter(|url| !url.trim().is_empty())
        .or(image_reference.as_ref())
        .cloned()
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerationBody {
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default, rename = "imageReference")]
    pub image_reference: Option<String>,
    /// Publishes progress under this id while the request is in flight.
    #[serde(default)]
    pub task_id: Option<String>,
}

impl GenerationBody {
    pub fn seed_image(&self) -> Option<String> {
        pick_image(&self.image_url, &self.image_reference)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageData {
    pub url: String,
    pub revised_prompt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationResponse {
    pub created: i64,
    pub data: Vec<ImageData>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskCreated {
    pub task_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchBody {
    pub prompts: Vec<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default, rename = "imageReference")]
    pub image_reference: Option<String>,
}

impl BatchBody {
    pub fn seed_image(&self) -> Option<String> {
        pick_image(&self.image_url, &self.image_reference)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchItem {
    pub prompt: String,
    pub url: Option<String>,
    pub status: BatchStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchResponse {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<BatchItem>,
}

impl BatchResponse {
    pub fn from_results(results: Vec<BatchItem>) -> Self {
        let successful = results
            .iter()
            .filter(|item| item.status == BatchStatus::Success)
            .count();
        Self {
            total: results.len(),
            successful,
            failed: results.len() - successful,
            results,
        }
    }
}

/// A history entry posted by a client; missing fields are filled in.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryBody {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    pub prompt: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default, rename = "imageReference")]
    pub image_reference: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: Value,
}

impl HistoryBody {
    pub fn into_entry(self) -> HistoryEntry {
        let image_url = pick_image(&self.image_url, &self.image_reference);
        HistoryEntry {
            id: self.id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            kind: self.kind.unwrap_or_else(|| "create".to_string()),
            prompt: self.prompt,
            image_url,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            metadata: self.metadata,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryResponse {
    pub history: Vec<HistoryEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: GenerationStats,
    /// Seconds since the server started.
    pub server_uptime: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatsQuery {
    pub success: bool,
    #[serde(default)]
    pub fallback: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadResponse {
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_url_wins_over_image_reference() {
        let body: GenerationBody = serde_json::from_str(
            r#"{"prompt": "p", "image_url": "https://a.test/1.png", "imageReference": "https://a.test/2.png"}"#,
        )
        .unwrap();
        assert_eq!(body.seed_image().as_deref(), Some("https://a.test/1.png"));

        let body: GenerationBody = serde_json::from_str(
            r#"{"prompt": "p", "image_url": " ", "imageReference": "https://a.test/2.png"}"#,
        )
        .unwrap();
        assert_eq!(body.seed_image().as_deref(), Some("https://a.test/2.png"));

        let body: BatchBody =
            serde_json::from_str(r#"{"prompts": ["p"], "imageReference": "https://a.test/2.png"}"#)
                .unwrap();
        assert_eq!(body.seed_image().as_deref(), Some("https://a.test/2.png"));
    }

    #[test]
    fn test_history_body_accepts_both_image_keys() {
        let body: HistoryBody = serde_json::from_str(
            r#"{"prompt": "p", "image_url": "https://a.test/1.png", "imageReference": "https://a.test/2.png"}"#,
        )
        .unwrap();
        let entry = body.into_entry();
        assert_eq!(entry.kind, "create");
        assert_eq!(entry.image_url.as_deref(), Some("https://a.test/1.png"));
    }
}
