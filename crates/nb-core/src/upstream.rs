//! Boundary to the upstream image-generation service.
//!
//! Transports return raw status/body pairs; [`reply`] decodes them once
//! into tagged variants so the submission and polling state machines
//! never look at raw JSON.

mod http;
pub mod reply;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::TransportError;
use crate::request::{GenerationRequest, JobId};
use crate::session::SessionContext;

pub use http::HttpUpstream;
pub use reply::{StatusReply, SubmitReply};

/// Upstream code signalling success on both submit and status calls.
pub const SUCCESS_CODE: i64 = 100_000;
/// Upstream code for a stale or flagged session.
pub const STALE_SESSION_CODE: i64 = 100_001;

/// An HTTP response reduced to what the state machines need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawReply {
    pub status: u16,
    pub body: String,
}

impl RawReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitPayload {
    pub image_urls: Vec<String>,
    #[serde(rename = "type")]
    pub kind: u32,
    pub user_prompt: String,
    pub sub_type: u32,
    pub aspect_ratio: String,
    pub num: String,
}

impl SubmitPayload {
    /// Builds the body for `request`, sending `default_seed` when the
    /// request has no seed image of its own.
    pub fn for_request(request: &GenerationRequest, default_seed: &str) -> Self {
        let seed = request.seed_image().unwrap_or(default_seed);
        Self {
            image_urls: vec![seed.to_string()],
            kind: 61,
            user_prompt: request.prompt().to_string(),
            sub_type: 2,
            aspect_ratio: String::new(),
            num: String::new(),
        }
    }
}

#[async_trait]
pub trait Upstream: Send + Sync {
    async fn submit(
        &self,
        session: &SessionContext,
        payload: &SubmitPayload,
    ) -> Result<RawReply, TransportError>;

    async fn status(
        &self,
        session: &SessionContext,
        job_id: &JobId,
    ) -> Result<RawReply, TransportError>;
}
