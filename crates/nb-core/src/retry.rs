//! Bounded retry state for submission attempts.

use std::fmt;
use std::time::Duration;

use crate::request::JobId;
use crate::upstream::{STALE_SESSION_CODE, SubmitReply};

/// Why an attempt did not produce a job id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryReason {
    RateLimited,
    Forbidden,
    HttpStatus(u16),
    EmptyBody,
    MalformedBody(String),
    StaleSession(String),
    ErrorCode { code: Option<i64>, message: String },
    Network(String),
}

impl fmt::Display for RetryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RateLimited => write!(f, "rate limited (HTTP 429)"),
            Self::Forbidden => write!(f, "forbidden (HTTP 403)"),
            Self::HttpStatus(status) => write!(f, "unexpected HTTP status {status}"),
            Self::EmptyBody => write!(f, "empty response body"),
            Self::MalformedBody(err) => write!(f, "invalid JSON response: {err}"),
            Self::StaleSession(message) => {
                write!(f, "{message} (code: {STALE_SESSION_CODE})")
            }
            Self::ErrorCode { code, message } => match code {
                Some(code) => write!(f, "{message} (code: {code})"),
                None => write!(f, "{message} (code: unknown)"),
            },
            Self::Network(err) => write!(f, "network error: {err}"),
        }
    }
}

/// Typed result of one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome<T> {
    Success(T),
    Retryable(RetryReason),
}

impl From<SubmitReply> for AttemptOutcome<JobId> {
    fn from(reply: SubmitReply) -> Self {
        match reply {
            SubmitReply::Accepted(job_id) => Self::Success(job_id),
            SubmitReply::RateLimited => Self::Retryable(RetryReason::RateLimited),
            SubmitReply::Forbidden => Self::Retryable(RetryReason::Forbidden),
            SubmitReply::HttpError(status) => Self::Retryable(RetryReason::HttpStatus(status)),
            SubmitReply::EmptyBody => Self::Retryable(RetryReason::EmptyBody),
            SubmitReply::MalformedBody(err) => Self::Retryable(RetryReason::MalformedBody(err)),
            SubmitReply::ErrorCode {
                code: Some(STALE_SESSION_CODE),
                message,
            } => Self::Retryable(RetryReason::StaleSession(message)),
            SubmitReply::ErrorCode { code, message } => {
                Self::Retryable(RetryReason::ErrorCode { code, message })
            }
        }
    }
}

/// Linear backoff: each failure class has a base unit that is multiplied
/// by `attempt + 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub max_attempts: u32,
    pub rate_limited: Duration,
    pub forbidden: Duration,
    pub http_error: Duration,
    pub bad_body: Duration,
    pub stale_session: Duration,
    pub error_code: Duration,
    pub network: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            rate_limited: Duration::from_secs(10),
            forbidden: Duration::from_secs(5),
            http_error: Duration::from_secs(3),
            bad_body: Duration::from_secs(2),
            stale_session: Duration::from_secs(3),
            error_code: Duration::from_secs(2),
            network: Duration::from_secs(3),
        }
    }
}

impl BackoffPolicy {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn unit_for(&self, reason: &RetryReason) -> Duration {
        match reason {
            RetryReason::RateLimited => self.rate_limited,
            RetryReason::Forbidden => self.forbidden,
            RetryReason::HttpStatus(_) => self.http_error,
            RetryReason::EmptyBody | RetryReason::MalformedBody(_) => self.bad_body,
            RetryReason::StaleSession(_) => self.stale_session,
            RetryReason::ErrorCode { .. } => self.error_code,
            RetryReason::Network(_) => self.network,
        }
    }

    /// Delay before the attempt following zero-based `attempt`, or `None`
    /// when `attempt` was the last one allowed.
    pub fn delay_after(&self, attempt: u32, reason: &RetryReason) -> Option<Duration> {
        if attempt + 1 >= self.max_attempts {
            return None;
        }
        Some(self.unit_for(reason) * (attempt + 1))
    }
}
