use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cancel::CancelSignal;
use crate::error::SubmissionError;
use crate::request::{GenerationRequest, JobId, SubmissionResult};
use crate::retry::{AttemptOutcome, BackoffPolicy, RetryReason};
use crate::session::SessionContext;
use crate::truncate_for_log;
use crate::upstream::{SubmitPayload, SubmitReply, Upstream};

/// Drives one submission to an accepted job id, retrying transient
/// failures under a [`BackoffPolicy`].
pub struct SubmissionClient {
    upstream: Arc<dyn Upstream>,
    policy: BackoffPolicy,
    default_seed: String,
}

impl SubmissionClient {
    pub fn new(upstream: Arc<dyn Upstream>, default_seed: impl Into<String>) -> Self {
        Self {
            upstream,
            policy: BackoffPolicy::default(),
            default_seed: default_seed.into(),
        }
    }

    pub fn with_policy(mut self, policy: BackoffPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Every attempt runs under a freshly built [`SessionContext`], so a
    /// flagged identity is never presented twice.
    pub async fn submit(
        &self,
        request: &GenerationRequest,
        cancel: &CancelSignal,
    ) -> Result<SubmissionResult, SubmissionError> {
        let payload = SubmitPayload::for_request(request, &self.default_seed);
        let max_attempts = self.policy.max_attempts;
        info!(
            prompt = %truncate_for_log(request.prompt(), 50),
            seed = %payload.image_urls[0],
            "submitting prediction"
        );

        let mut last_reason: Option<RetryReason> = None;
        for attempt in 0..max_attempts {
            let session = SessionContext::build();
            debug!("attempt {}/{}", attempt + 1, max_attempts);

            let Some(outcome) = cancel.guard(self.attempt(&session, &payload)).await else {
                return Err(SubmissionError::Cancelled);
            };

            let reason = match outcome {
                AttemptOutcome::Success(job_id) => {
                    info!(%job_id, attempts = attempt + 1, "prediction accepted");
                    return Ok(SubmissionResult {
                        job_id,
                        session,
                        attempts: attempt + 1,
                    });
                }
                AttemptOutcome::Retryable(reason) => reason,
            };

            warn!(
                "submission attempt {}/{} failed: {}",
                attempt + 1,
                max_attempts,
                reason
            );
            if let Some(delay) = self.policy.delay_after(attempt, &reason) {
                debug!("backing off for {:?}", delay);
                if cancel.guard(tokio::time::sleep(delay)).await.is_none() {
                    return Err(SubmissionError::Cancelled);
                }
            }
            last_reason = Some(reason);
        }

        Err(SubmissionError::Exhausted {
            attempts: max_attempts,
            reason: last_reason
                .map(|reason| reason.to_string())
                .unwrap_or_else(|| "no attempts were made".to_string()),
        })
    }

    async fn attempt(
        &self,
        session: &SessionContext,
        payload: &SubmitPayload,
    ) -> AttemptOutcome<JobId> {
        match self.upstream.submit(session, payload).await {
            Ok(raw) => {
                debug!(
                    status = raw.status,
                    body = %truncate_for_log(&raw.body, 500),
                    "submission response"
                );
                SubmitReply::decode(&raw).into()
            }
            Err(err) => AttemptOutcome::Retryable(RetryReason::Network(err.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::Instant;

    use super::*;
    use crate::testing::{ScriptedUpstream, accepted, network_error, raw, rejected};
    use crate::upstream::STALE_SESSION_CODE;

    fn request() -> GenerationRequest {
        GenerationRequest::new("A beautiful sunset over mountains", None).unwrap()
    }

    fn client(upstream: &Arc<ScriptedUpstream>) -> SubmissionClient {
        SubmissionClient::new(upstream.clone(), "https://seed.test/default.jpg")
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_twice_then_accepted() {
        let upstream = Arc::new(ScriptedUpstream::new(
            vec![raw(429, ""), raw(429, ""), accepted("job-1")],
            vec![],
        ));
        let started = Instant::now();

        let result = client(&upstream)
            .submit(&request(), &CancelSignal::never())
            .await
            .unwrap();

        assert_eq!(result.job_id.as_str(), "job-1");
        assert_eq!(result.attempts, 3);
        assert_eq!(upstream.submit_calls(), 3);
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(30) && waited < Duration::from_secs(31));
    }

    #[tokio::test(start_paused = true)]
    async fn test_every_attempt_uses_a_fresh_session() {
        let upstream = Arc::new(ScriptedUpstream::new(
            vec![raw(403, ""), network_error(), raw(500, "oops"), accepted("job-2")],
            vec![],
        ));

        let result = client(&upstream)
            .submit(&request(), &CancelSignal::never())
            .await
            .unwrap();

        let sessions = upstream.submit_sessions();
        assert_eq!(sessions.len(), 4);
        for pair in sessions.windows(2) {
            assert_ne!(pair[0], pair[1]);
        }
        assert_eq!(result.session, sessions[3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_five_attempts() {
        let upstream = Arc::new(ScriptedUpstream::new(vec![raw(200, "")], vec![]));

        let err = client(&upstream)
            .submit(&request(), &CancelSignal::never())
            .await
            .unwrap_err();

        assert_eq!(upstream.submit_calls(), 5);
        assert_eq!(
            err,
            SubmissionError::Exhausted {
                attempts: 5,
                reason: "empty response body".into()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_session_code_backs_off_three_units() {
        let upstream = Arc::new(ScriptedUpstream::new(
            vec![rejected(STALE_SESSION_CODE, "session expired"), accepted("job-3")],
            vec![],
        ));
        let started = Instant::now();

        client(&upstream)
            .submit(&request(), &CancelSignal::never())
            .await
            .unwrap();

        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(3) && waited < Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_reason_is_reported() {
        let upstream = Arc::new(ScriptedUpstream::new(
            vec![raw(429, ""), rejected(42, "quota exceeded")],
            vec![],
        ));

        let err = client(&upstream)
            .with_policy(BackoffPolicy::default().with_max_attempts(2))
            .submit(&request(), &CancelSignal::never())
            .await
            .unwrap_err();

        assert_eq!(upstream.submit_calls(), 2);
        assert_eq!(
            err.to_string(),
            "submission failed after 2 attempts: quota exceeded (code: 42)"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff() {
        let upstream = Arc::new(ScriptedUpstream::new(vec![raw(429, "")], vec![]));
        let (handle, signal) = CancelSignal::pair();
        let submitter = client(&upstream);

        let task = tokio::spawn(async move { submitter.submit(&request(), &signal).await });
        tokio::time::sleep(Duration::from_secs(1)).await;
        handle.cancel();

        assert_eq!(task.await.unwrap().unwrap_err(), SubmissionError::Cancelled);
        assert_eq!(upstream.submit_calls(), 1);
    }
}
