use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use nb_core::fallback::PlaceholderFallback;
use nb_core::progress::TaskProgress;
use nb_core::relay::{HttpFetcher, ResultRelay, default_services};
use nb_core::upstream::HttpUpstream;
use nb_core::{
    CancelHandle, CancelSignal, GenerationError, GenerationOutcome, GenerationRequest,
    MemoryProgressStore, Orchestrator, ProgressSink, ProgressStore, ProgressUpdate,
};
use serde_json::json;
use tracing::warn;

use crate::config::AppConfig;
use crate::db::stats::Recorded;
use crate::db::{HistoryEntry, HistoryStore, StatsStore};

/// A live registration in the task table.
pub struct TrackedTask {
    pub cancel: CancelSignal,
    ticket: u64,
}

pub struct AppState {
    pub orchestrator: Orchestrator,
    pub progress: Arc<MemoryProgressStore>,
    pub history: HistoryStore,
    pub stats: StatsStore,
    pub batch_concurrency: usize,
    tasks: DashMap<String, (u64, CancelHandle)>,
    next_ticket: AtomicU64,
    started: Instant,
}

impl AppState {
    pub fn new(
        orchestrator: Orchestrator,
        history: HistoryStore,
        stats: StatsStore,
        batch_concurrency: usize,
    ) -> Self {
        Self {
            orchestrator,
            progress: Arc::new(MemoryProgressStore::new()),
            history,
            stats,
            batch_concurrency: batch_concurrency.max(1),
            tasks: DashMap::new(),
            next_ticket: AtomicU64::new(0),
            started: Instant::now(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let upstream = Arc::new(HttpUpstream::new(&config.upstream_base_url));
        let relay = ResultRelay::new(Arc::new(HttpFetcher::new()), default_services())
            .with_min_bytes(config.min_asset_bytes);
        let fallback = Arc::new(PlaceholderFallback::new(&config.fallback_image_url));
        let orchestrator = Orchestrator::new(upstream, relay, fallback, config.lifecycle());

        Self::new(
            orchestrator,
            HistoryStore::new(config.history_path()),
            StatsStore::new(config.stats_path()),
            config.batch_concurrency,
        )
    }

    pub fn uptime_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    pub fn task_sink(&self, task_id: &str) -> TaskProgress {
        TaskProgress::new(self.progress.clone(), task_id)
    }

    pub fn progress_of(&self, task_id: &str) -> Option<ProgressUpdate> {
        self.progress.get(task_id)
    }

    /// Registers a running task and hands back the signal its lifecycle
    /// should observe, or `None` when a task with that id is still running.
    pub fn track(&self, task_id: &str) -> Option<TrackedTask> {
        let Entry::Vacant(slot) = self.tasks.entry(task_id.to_string()) else {
            return None;
        };
        let (handle, cancel) = CancelSignal::pair();
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        slot.insert((ticket, handle));
        self.progress.set(task_id, ProgressUpdate::queued());
        Some(TrackedTask { cancel, ticket })
    }

    /// Drops the registration made by `tracked`, leaving any later task
    /// that reused the id in place.
    pub fn untrack(&self, task_id: &str, tracked: &TrackedTask) {
        self.tasks
            .remove_if(task_id, |_, (ticket, _)| *ticket == tracked.ticket);
    }

    /// Raises the cancel signal of a running task. Returns false when the
    /// task is unknown or already finished.
    pub fn cancel(&self, task_id: &str) -> bool {
        match self.tasks.remove(task_id) {
            Some((_, (_, handle))) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }

    /// Runs one lifecycle and books its outcome into the stats and history
    /// files. Store failures are logged, never surfaced.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        progress: &dyn ProgressSink,
        cancel: &CancelSignal,
    ) -> Result<GenerationOutcome, GenerationError> {
        let result = self.orchestrator.generate(request, progress, cancel).await;

        let recorded = match &result {
            Ok(outcome) => Recorded::Success {
                used_fallback: outcome.used_fallback,
            },
            Err(_) => Recorded::Failure,
        };
        if let Err(err) = self.stats.record(recorded).await {
            warn!("failed to update generation stats: {:#}", err);
        }

        if let Ok(outcome) = &result {
            let entry = HistoryEntry::generated(
                request.prompt(),
                &outcome.final_asset_reference,
                json!({
                    "seed_image": request.seed_image(),
                    "used_fallback": outcome.used_fallback,
                }),
            );
            if let Err(err) = self.history.append(entry).await {
                warn!("failed to append to history: {:#}", err);
            }
        }

        result
    }
}
