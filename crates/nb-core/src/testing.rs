//! Scripted collaborators for exercising lifecycles without a network.
//!
//! Each script is a queue; the final entry repeats once the queue is down
//! to one item, so "rate limited forever" is a one-element script.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::{FallbackError, RelayError, TransportError};
use crate::fallback::FallbackProvider;
use crate::relay::{Asset, AssetFetcher, RelayService};
use crate::request::{GenerationRequest, JobId};
use crate::session::SessionContext;
use crate::upstream::{RawReply, SubmitPayload, Upstream};

pub type Scripted = Result<RawReply, TransportError>;

struct Script<T: Clone> {
    queue: Mutex<VecDeque<T>>,
    fallback: T,
}

impl<T: Clone> Script<T> {
    fn new(items: Vec<T>, fallback: T) -> Self {
        Self {
            queue: Mutex::new(items.into()),
            fallback,
        }
    }

    fn next(&self) -> T {
        let mut queue = self.queue.lock().expect("script lock poisoned");
        if queue.len() > 1 {
            queue.pop_front().unwrap_or_else(|| self.fallback.clone())
        } else {
            queue.front().cloned().unwrap_or_else(|| self.fallback.clone())
        }
    }
}

pub struct ScriptedUpstream {
    submits: Script<Scripted>,
    statuses: Script<Scripted>,
    submit_calls: AtomicUsize,
    status_calls: AtomicUsize,
    sessions: Mutex<Vec<SessionContext>>,
    payloads: Mutex<Vec<SubmitPayload>>,
}

impl ScriptedUpstream {
    pub fn new(submits: Vec<Scripted>, statuses: Vec<Scripted>) -> Self {
        let exhausted = Err(TransportError::Connect("script exhausted".into()));
        Self {
            submits: Script::new(submits, exhausted.clone()),
            statuses: Script::new(statuses, exhausted),
            submit_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
            sessions: Mutex::new(Vec::new()),
            payloads: Mutex::new(Vec::new()),
        }
    }

    /// Accepts the first submission and walks `statuses`.
    pub fn accepting(job_id: &str, statuses: Vec<Scripted>) -> Self {
        Self::new(vec![accepted(job_id)], statuses)
    }

    pub fn submit_calls(&self) -> usize {
        self.submit_calls.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    /// Sessions presented on submit calls, in call order.
    pub fn submit_sessions(&self) -> Vec<SessionContext> {
        self.sessions.lock().expect("sessions lock poisoned").clone()
    }

    pub fn payloads(&self) -> Vec<SubmitPayload> {
        self.payloads.lock().expect("payloads lock poisoned").clone()
    }
}

#[async_trait]
impl Upstream for ScriptedUpstream {
    async fn submit(
        &self,
        session: &SessionContext,
        payload: &SubmitPayload,
    ) -> Result<RawReply, TransportError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        self.sessions
            .lock()
            .expect("sessions lock poisoned")
            .push(session.clone());
        self.payloads
            .lock()
            .expect("payloads lock poisoned")
            .push(payload.clone());
        self.submits.next()
    }

    async fn status(
        &self,
        _session: &SessionContext,
        _job_id: &JobId,
    ) -> Result<RawReply, TransportError> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.statuses.next()
    }
}

pub fn reply(status: u16, body: Value) -> Scripted {
    Ok(RawReply::new(status, body.to_string()))
}

pub fn raw(status: u16, body: &str) -> Scripted {
    Ok(RawReply::new(status, body))
}

pub fn network_error() -> Scripted {
    Err(TransportError::Connect("connection refused".into()))
}

pub fn accepted(job_id: &str) -> Scripted {
    reply(200, json!({ "code": 100000, "data": { "session_id": job_id } }))
}

pub fn rejected(code: i64, message: &str) -> Scripted {
    reply(200, json!({ "code": code, "message": message, "data": {} }))
}

pub fn status_row(status: &str, progress: u8, urls: &[&str]) -> Scripted {
    reply(
        200,
        json!({
            "code": 100000,
            "message": "ok",
            "data": { "results": [ { "status": status, "progress": progress, "urls": urls } ] }
        }),
    )
}

pub fn failed_row(error: &str) -> Scripted {
    reply(
        200,
        json!({
            "code": 100000,
            "data": { "results": [ { "status": "failed", "error": error } ] }
        }),
    )
}

pub struct ScriptedFetcher {
    result: Result<Vec<u8>, RelayError>,
    calls: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn serving(bytes: Vec<u8>) -> Self {
        Self {
            result: Ok(bytes),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            result: Err(RelayError::Download(reason.into())),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AssetFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> Result<Asset, RelayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result
            .clone()
            .map(|bytes| Asset::from_download(url, bytes))
    }
}

/// A PNG-signed payload comfortably above the relay size floor.
pub fn png_bytes(len: usize) -> Vec<u8> {
    let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    bytes.resize(len.max(bytes.len()), 0);
    bytes
}

pub struct ScriptedRelay {
    name: String,
    result: Result<String, String>,
    calls: AtomicUsize,
}

impl ScriptedRelay {
    pub fn hosting(name: &str, url: &str) -> Self {
        Self {
            name: name.into(),
            result: Ok(url.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(name: &str) -> Self {
        Self {
            name: name.into(),
            result: Err("service unavailable".into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RelayService for ScriptedRelay {
    fn name(&self) -> &str {
        &self.name
    }

    async fn upload(&self, _asset: &Asset) -> Result<String, RelayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone().map_err(|reason| RelayError::Upload {
            service: self.name.clone(),
            reason,
        })
    }
}

pub struct BrokenFallback;

#[async_trait]
impl FallbackProvider for BrokenFallback {
    async fn generate(&self, _request: &GenerationRequest) -> Result<String, FallbackError> {
        Err(FallbackError::Failed("placeholder host unreachable".into()))
    }
}
