use std::sync::Arc;

use tracing::{error, info, warn};

use crate::cancel::CancelSignal;
use crate::error::GenerationError;
use crate::fallback::FallbackProvider;
use crate::job::{LifecycleStage, TaskStatus};
use crate::poll::{PollSettings, StatusPoller};
use crate::progress::{ProgressSink, ProgressUpdate};
use crate::relay::ResultRelay;
use crate::request::{GenerationOutcome, GenerationRequest};
use crate::retry::BackoffPolicy;
use crate::submit::SubmissionClient;
use crate::truncate_for_log;
use crate::upstream::Upstream;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleSettings {
    pub poll: PollSettings,
    pub backoff: BackoffPolicy,
    pub fallback_enabled: bool,
    /// Sent as the seed image when a request brings none.
    pub default_seed_image: String,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            poll: PollSettings::default(),
            backoff: BackoffPolicy::default(),
            fallback_enabled: true,
            default_seed_image: "https://wallpaperaccess.com/full/1556608.jpg".to_string(),
        }
    }
}

/// Runs generation lifecycles: submit, poll, relay, with fallback on the
/// two upstream stages.
pub struct Orchestrator {
    submitter: SubmissionClient,
    poller: StatusPoller,
    relay: ResultRelay,
    fallback: Arc<dyn FallbackProvider>,
    settings: LifecycleSettings,
}

impl Orchestrator {
    pub fn new(
        upstream: Arc<dyn Upstream>,
        relay: ResultRelay,
        fallback: Arc<dyn FallbackProvider>,
        settings: LifecycleSettings,
    ) -> Self {
        let submitter = SubmissionClient::new(upstream.clone(), &settings.default_seed_image)
            .with_policy(settings.backoff.clone());
        Self {
            submitter,
            poller: StatusPoller::new(upstream),
            relay,
            fallback,
            settings,
        }
    }

    pub fn relay(&self) -> &ResultRelay {
        &self.relay
    }

    /// Runs one lifecycle to a terminal outcome.
    ///
    /// Submission and polling failures go to the fallback provider when it
    /// is enabled; relay failures degrade to the upstream's own url. The
    /// last update sent to `progress` always has a complete status.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        progress: &dyn ProgressSink,
        cancel: &CancelSignal,
    ) -> Result<GenerationOutcome, GenerationError> {
        info!(
            prompt = %truncate_for_log(request.prompt(), 50),
            seed = ?request.seed_image(),
            "starting image generation"
        );

        enter(progress, LifecycleStage::Submitting, 0, "Submitting request");
        let upstream_result = match self.submitter.submit(request, cancel).await {
            Ok(submission) => {
                enter(progress, LifecycleStage::Polling, 0, "Waiting for upstream");
                self.poller
                    .poll(&submission, &self.settings.poll, progress, cancel)
                    .await
                    .map_err(GenerationError::from)
            }
            Err(err) => Err(GenerationError::from(err)),
        };

        match upstream_result {
            Ok(source_url) => Ok(self.finish(source_url, progress, cancel).await),
            Err(cause) => self.recover(request, cause, progress).await,
        }
    }

    async fn finish(
        &self,
        source_url: String,
        progress: &dyn ProgressSink,
        cancel: &CancelSignal,
    ) -> GenerationOutcome {
        enter(progress, LifecycleStage::Relaying, 95, "Uploading result");
        let final_url = match cancel.guard(self.relay.relocate(&source_url)).await {
            Some(Ok(url)) => url,
            Some(Err(err)) => {
                warn!("relay failed, keeping upstream url: {}", err);
                source_url
            }
            None => {
                warn!("relay cancelled, keeping upstream url");
                source_url
            }
        };

        info!(url = %final_url, "image generation and upload completed");
        progress.report(
            ProgressUpdate::new(
                TaskStatus::Succeeded,
                LifecycleStage::Done,
                100,
                "Image ready",
            )
            .with_url(&final_url),
        );
        GenerationOutcome {
            final_asset_reference: final_url,
            used_fallback: false,
        }
    }

    async fn recover(
        &self,
        request: &GenerationRequest,
        cause: GenerationError,
        progress: &dyn ProgressSink,
    ) -> Result<GenerationOutcome, GenerationError> {
        error!("upstream generation failed: {}", cause);
        if !self.settings.fallback_enabled {
            fail(progress, &cause);
            return Err(cause);
        }

        info!("attempting fallback image generation");
        enter(progress, LifecycleStage::Fallback, 0, "Using fallback provider");
        match self.fallback.generate(request).await {
            Ok(url) => {
                progress.report(
                    ProgressUpdate::new(
                        TaskStatus::Succeeded,
                        LifecycleStage::Done,
                        100,
                        "Fallback image ready",
                    )
                    .with_url(&url),
                );
                Ok(GenerationOutcome {
                    final_asset_reference: url,
                    used_fallback: true,
                })
            }
            Err(fallback) => {
                let err = GenerationError::Fallback {
                    cause: cause.to_string(),
                    fallback,
                };
                error!("{}", err);
                fail(progress, &err);
                Err(err)
            }
        }
    }
}

fn enter(progress: &dyn ProgressSink, stage: LifecycleStage, percent: u8, message: &str) {
    info!(?stage, "{}", stage.label());
    progress.report(ProgressUpdate::new(
        TaskStatus::Running,
        stage,
        percent,
        message,
    ));
}

fn fail(progress: &dyn ProgressSink, err: &GenerationError) {
    progress.report(ProgressUpdate::new(
        TaskStatus::Failed,
        LifecycleStage::Done,
        0,
        err.to_string(),
    ));
}
