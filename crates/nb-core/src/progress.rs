use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::job::{LifecycleStage, TaskStatus};

/// Externally observable state of one lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressUpdate {
    pub status: TaskStatus,
    pub progress: u8,
    pub message: String,
    pub stage: LifecycleStage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl ProgressUpdate {
    pub fn new(
        status: TaskStatus,
        stage: LifecycleStage,
        progress: u8,
        message: impl Into<String>,
    ) -> Self {
        Self {
            status,
            progress: progress.min(100),
            message: message.into(),
            stage,
            url: None,
            updated_at: Utc::now(),
        }
    }

    pub fn queued() -> Self {
        Self::new(TaskStatus::Queued, LifecycleStage::Init, 0, "Queued")
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// Receiver for progress as a lifecycle advances.
pub trait ProgressSink: Send + Sync {
    fn report(&self, update: ProgressUpdate);
}

/// Discards every update.
impl ProgressSink for () {
    fn report(&self, _update: ProgressUpdate) {}
}

/// Keyed progress records shared between running lifecycles and readers.
pub trait ProgressStore: Send + Sync {
    fn set(&self, task_id: &str, update: ProgressUpdate);
    fn get(&self, task_id: &str) -> Option<ProgressUpdate>;
    fn remove(&self, task_id: &str) -> Option<ProgressUpdate>;
}

#[derive(Debug, Default)]
pub struct MemoryProgressStore {
    tasks: DashMap<String, ProgressUpdate>,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops finished tasks last touched before `cutoff`.
    pub fn prune_finished(&self, cutoff: DateTime<Utc>) -> usize {
        let before = self.tasks.len();
        self.tasks
            .retain(|_, update| update.status.is_active() || update.updated_at >= cutoff);
        before.saturating_sub(self.tasks.len())
    }
}

impl ProgressStore for MemoryProgressStore {
    fn set(&self, task_id: &str, update: ProgressUpdate) {
        self.tasks.insert(task_id.to_string(), update);
    }

    fn get(&self, task_id: &str) -> Option<ProgressUpdate> {
        self.tasks.get(task_id).map(|entry| entry.value().clone())
    }

    fn remove(&self, task_id: &str) -> Option<ProgressUpdate> {
        self.tasks.remove(task_id).map(|(_, update)| update)
    }
}

/// Publishes one task's updates into a store under its id.
pub struct TaskProgress {
    store: Arc<dyn ProgressStore>,
    task_id: String,
}

impl TaskProgress {
    pub fn new(store: Arc<dyn ProgressStore>, task_id: impl Into<String>) -> Self {
        Self {
            store,
            task_id: task_id.into(),
        }
    }
}

impl ProgressSink for TaskProgress {
    fn report(&self, update: ProgressUpdate) {
        self.store.set(&self.task_id, update);
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn test_task_progress_writes_through() {
        let store = Arc::new(MemoryProgressStore::new());
        let sink = TaskProgress::new(store.clone(), "task-1");

        sink.report(ProgressUpdate::new(
            TaskStatus::Running,
            LifecycleStage::Polling,
            130,
            "processing",
        ));

        let update = store.get("task-1").unwrap();
        assert_eq!(update.progress, 100);
        assert_eq!(update.stage, LifecycleStage::Polling);
        assert!(store.get("task-2").is_none());
    }

    #[test]
    fn test_prune_keeps_active_tasks() {
        let store = MemoryProgressStore::new();
        let mut old = ProgressUpdate::new(TaskStatus::Succeeded, LifecycleStage::Done, 100, "done");
        old.updated_at = Utc::now() - Duration::hours(2);
        store.set("old", old);

        let mut stuck = ProgressUpdate::queued();
        stuck.updated_at = Utc::now() - Duration::hours(2);
        store.set("stuck", stuck);

        let removed = store.prune_finished(Utc::now() - Duration::hours(1));
        assert_eq!(removed, 1);
        assert!(store.get("stuck").is_some());
        assert!(store.get("old").is_none());
    }

    #[test]
    fn test_url_omitted_until_known() {
        let json = serde_json::to_value(ProgressUpdate::queued()).unwrap();
        assert!(json.get("url").is_none());
        assert_eq!(json["status"], "queued");
        assert_eq!(json["stage"], "init");
    }
}
