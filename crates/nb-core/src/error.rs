use thiserror::Error;

/// Caller input rejected before any network call is made.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Prompt cannot be empty")]
    EmptyPrompt,
}

/// A single outbound call that never produced an HTTP response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request failed: {0}")]
    Request(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_connect() {
            Self::Connect(err.to_string())
        } else {
            Self::Request(err.to_string())
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmissionError {
    #[error("submission failed after {attempts} attempts: {reason}")]
    Exhausted { attempts: u32, reason: String },
    #[error("submission cancelled")]
    Cancelled,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PollError {
    #[error("timed out waiting for image generation after {0}s")]
    Timeout(u64),
    #[error("polling failed after {0} consecutive network errors")]
    Network(u32),
    #[error("session timed out on server side")]
    SessionExpired,
    #[error("API error: {0}")]
    Upstream(String),
    #[error("succeeded status but result urls are empty")]
    EmptyResult,
    #[error("generation failed: {0}")]
    Generation(String),
    #[error("polling cancelled")]
    Cancelled,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("failed to download asset: {0}")]
    Download(String),
    #[error("downloaded content too small ({0} bytes), might not be a valid image")]
    PayloadTooSmall(usize),
    #[error("upload to {service} failed: {reason}")]
    Upload { service: String, reason: String },
    #[error("all relay services failed")]
    Exhausted,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FallbackError {
    #[error("fallback provider has no placeholder configured")]
    Unconfigured,
    #[error("fallback provider failed: {0}")]
    Failed(String),
}

/// The single consolidated error a lifecycle surfaces to its caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Image generation failed: {0}")]
    Submission(#[from] SubmissionError),
    #[error("Image generation failed: {0}")]
    Poll(#[from] PollError),
    #[error("Image generation failed: {cause}; fallback also failed: {fallback}")]
    Fallback {
        cause: String,
        fallback: FallbackError,
    },
}
