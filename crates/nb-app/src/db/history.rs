use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::JsonFile;

pub const HISTORY_LIMIT: usize = 100;

/// One generated (or edited) image, newest entries first on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub id: String,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
    pub prompt: String,
    pub image_url: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Value,
}

fn default_kind() -> String {
    "create".to_string()
}

impl HistoryEntry {
    pub fn generated(prompt: &str, image_url: &str, metadata: Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind: default_kind(),
            prompt: prompt.to_string(),
            image_url: Some(image_url.to_string()),
            timestamp: Utc::now(),
            metadata,
        }
    }
}

#[derive(Debug)]
pub struct HistoryStore {
    file: JsonFile,
}

impl HistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            file: JsonFile::new(path),
        }
    }

    pub async fn list(&self) -> Result<Vec<HistoryEntry>> {
        self.file.read().await
    }

    /// Puts `entry` at the front and drops the oldest entries past
    /// [`HISTORY_LIMIT`]. Returns the new length.
    pub async fn append(&self, entry: HistoryEntry) -> Result<usize> {
        self.file
            .update(|history: &mut Vec<HistoryEntry>| {
                history.insert(0, entry);
                history.truncate(HISTORY_LIMIT);
                history.len()
            })
            .await
    }
}
