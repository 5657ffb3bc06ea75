use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::JsonFile;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GenerationStats {
    pub total_generations: u64,
    pub successful_generations: u64,
    pub failed_generations: u64,
    pub fallback_generations: u64,
    pub last_updated: Option<DateTime<Utc>>,
}

/// How a finished lifecycle counts toward the running totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recorded {
    Success { used_fallback: bool },
    Failure,
}

impl GenerationStats {
    pub fn record(&mut self, outcome: Recorded) {
        self.total_generations += 1;
        match outcome {
            Recorded::Success { used_fallback } => {
                self.successful_generations += 1;
                if used_fallback {
                    self.fallback_generations += 1;
                }
            }
            Recorded::Failure => self.failed_generations += 1,
        }
        self.last_updated = Some(Utc::now());
    }
}

#[derive(Debug)]
pub struct StatsStore {
    file: JsonFile,
}

impl StatsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            file: JsonFile::new(path),
        }
    }

    pub async fn load(&self) -> Result<GenerationStats> {
        self.file.read().await
    }

    pub async fn record(&self, outcome: Recorded) -> Result<GenerationStats> {
        self.file
            .update(|stats: &mut GenerationStats| {
                stats.record(outcome);
                stats.clone()
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counters_accumulate() {
        let dir = tempfile::tempdir().unwrap();
        let store = StatsStore::new(dir.path().join("generation_stats.json"));
        assert_eq!(store.load().await.unwrap(), GenerationStats::default());

        store.record(Recorded::Success { used_fallback: false }).await.unwrap();
        store.record(Recorded::Success { used_fallback: true }).await.unwrap();
        let stats = store.record(Recorded::Failure).await.unwrap();

        assert_eq!(stats.total_generations, 3);
        assert_eq!(stats.successful_generations, 2);
        assert_eq!(stats.failed_generations, 1);
        assert_eq!(stats.fallback_generations, 1);
        assert!(stats.last_updated.is_some());
        assert_eq!(store.load().await.unwrap(), stats);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let stats: GenerationStats =
            serde_json::from_str(r#"{"total_generations": 4, "successful_generations": 4}"#)
                .unwrap();
        assert_eq!(stats.failed_generations, 0);
        assert_eq!(stats.last_updated, None);
    }
}
