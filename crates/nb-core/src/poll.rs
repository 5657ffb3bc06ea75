use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::cancel::CancelSignal;
use crate::error::PollError;
use crate::job::{LifecycleStage, TaskStatus};
use crate::progress::{ProgressSink, ProgressUpdate};
use crate::request::SubmissionResult;
use crate::truncate_for_log;
use crate::upstream::reply::PollStatus;
use crate::upstream::{StatusReply, Upstream};

pub use crate::upstream::reply::PollResult;

/// Wall-clock and error budgets for one polling run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSettings {
    pub timeout: Duration,
    pub interval: Duration,
    pub max_network_errors: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(120),
            interval: Duration::from_secs(5),
            max_network_errors: 5,
        }
    }
}

/// What one status query means for the loop.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Cycle {
    Done(String),
    Continue,
    Fatal(PollError),
}

pub struct StatusPoller {
    upstream: Arc<dyn Upstream>,
}

impl StatusPoller {
    pub fn new(upstream: Arc<dyn Upstream>) -> Self {
        Self { upstream }
    }

    /// Polls until the job reaches a terminal state and returns its first
    /// result url.
    ///
    /// Two budgets apply independently: the wall-clock `timeout`, checked
    /// before every query, and a count of consecutive network-level errors
    /// that any answered query resets. Bad HTTP statuses and unreadable
    /// bodies only cost time.
    pub async fn poll(
        &self,
        submission: &SubmissionResult,
        settings: &PollSettings,
        progress: &dyn ProgressSink,
        cancel: &CancelSignal,
    ) -> Result<String, PollError> {
        let job_id = &submission.job_id;
        let started = Instant::now();
        let mut consecutive_errors = 0u32;
        info!(%job_id, "polling status");

        loop {
            let elapsed = started.elapsed();
            if elapsed >= settings.timeout {
                error!(
                    %job_id,
                    "timed out waiting for image generation after {}s",
                    settings.timeout.as_secs()
                );
                return Err(PollError::Timeout(settings.timeout.as_secs()));
            }

            let Some(response) = cancel
                .guard(self.upstream.status(&submission.session, job_id))
                .await
            else {
                return Err(PollError::Cancelled);
            };

            let wait = match response {
                Err(err) => {
                    consecutive_errors += 1;
                    warn!(
                        "request error during polling ({}/{}): {}",
                        consecutive_errors, settings.max_network_errors, err
                    );
                    if consecutive_errors >= settings.max_network_errors {
                        error!(%job_id, "too many consecutive polling errors");
                        return Err(PollError::Network(consecutive_errors));
                    }
                    settings.interval * 2
                }
                Ok(raw) => {
                    consecutive_errors = 0;
                    debug!(
                        status = raw.status,
                        body = %truncate_for_log(&raw.body, 500),
                        "polling response"
                    );
                    match classify(StatusReply::decode(&raw), progress) {
                        Cycle::Done(url) => {
                            info!(%job_id, %url, "image generation succeeded");
                            return Ok(url);
                        }
                        Cycle::Fatal(err) => {
                            error!(%job_id, "polling failed: {}", err);
                            return Err(err);
                        }
                        Cycle::Continue => settings.interval,
                    }
                }
            };

            let remaining = settings.timeout.saturating_sub(started.elapsed());
            if cancel
                .guard(tokio::time::sleep(wait.min(remaining)))
                .await
                .is_none()
            {
                return Err(PollError::Cancelled);
            }
        }
    }
}

fn classify(reply: StatusReply, progress: &dyn ProgressSink) -> Cycle {
    match reply {
        StatusReply::HttpError(status) => {
            warn!("non-2xx status during polling: {}", status);
            Cycle::Continue
        }
        StatusReply::EmptyBody => {
            warn!("empty polling response, retrying");
            Cycle::Continue
        }
        StatusReply::MalformedBody(err) => {
            warn!("invalid JSON polling response: {}", err);
            Cycle::Continue
        }
        StatusReply::SessionExpired(_) => Cycle::Fatal(PollError::SessionExpired),
        StatusReply::ErrorCode { message, .. } => Cycle::Fatal(PollError::Upstream(message)),
        StatusReply::NoResults => {
            info!("no results yet, continuing to poll");
            Cycle::Continue
        }
        StatusReply::Progress(result) => match result.status {
            PollStatus::Succeeded => match result.result_urls.into_iter().next() {
                Some(url) => Cycle::Done(url),
                None => Cycle::Fatal(PollError::EmptyResult),
            },
            PollStatus::Failed => Cycle::Fatal(PollError::Generation(
                result
                    .error_detail
                    .unwrap_or_else(|| "Unknown error".to_string()),
            )),
            ref status if status.is_pending() => {
                info!(
                    "generation in progress: {} ({}%)",
                    status.as_str(),
                    result.progress_percent
                );
                progress.report(ProgressUpdate::new(
                    TaskStatus::Running,
                    LifecycleStage::Polling,
                    result.progress_percent,
                    format!("Generation {} ({}%)", status.as_str(), result.progress_percent),
                ));
                Cycle::Continue
            }
            status => {
                info!("unknown status: {}", status.as_str());
                Cycle::Continue
            }
        },
    }
}
