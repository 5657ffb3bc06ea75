use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ACCEPT, COOKIE, ORIGIN, REFERER, USER_AGENT};

use super::{RawReply, SubmitPayload, Upstream};
use crate::error::TransportError;
use crate::request::JobId;
use crate::session::SessionContext;

const BROWSER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

pub struct HttpUpstream {
    http: Client,
    base_url: String,
    submit_timeout: Duration,
    status_timeout: Duration,
}

impl HttpUpstream {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim().trim_end_matches('/').to_string(),
            submit_timeout: Duration::from_secs(60),
            status_timeout: Duration::from_secs(30),
        }
    }

    fn submit_endpoint(&self) -> String {
        format!("{}/api/v1/prediction/handle", self.base_url)
    }

    fn status_endpoint(&self) -> String {
        format!("{}/api/v1/prediction/get-status", self.base_url)
    }

    fn browser_request(
        &self,
        builder: reqwest::RequestBuilder,
        session: &SessionContext,
    ) -> reqwest::RequestBuilder {
        builder
            .header(ACCEPT, "application/json, text/plain, */*")
            .header(COOKIE, session.cookie_header())
            .header(ORIGIN, &self.base_url)
            .header(REFERER, format!("{}/ai-models/nano-banana", self.base_url))
            .header(USER_AGENT, BROWSER_AGENT)
    }
}

async fn into_raw(response: reqwest::Response) -> Result<RawReply, TransportError> {
    let status = response.status().as_u16();
    let body = response.text().await?;
    Ok(RawReply { status, body })
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn submit(
        &self,
        session: &SessionContext,
        payload: &SubmitPayload,
    ) -> Result<RawReply, TransportError> {
        let response = self
            .browser_request(self.http.post(self.submit_endpoint()), session)
            .header("x-requested-with", "XMLHttpRequest")
            .json(payload)
            .timeout(self.submit_timeout)
            .send()
            .await?;
        into_raw(response).await
    }

    async fn status(
        &self,
        session: &SessionContext,
        job_id: &JobId,
    ) -> Result<RawReply, TransportError> {
        let response = self
            .browser_request(self.http.get(self.status_endpoint()), session)
            .query(&[("session_id", job_id.as_str())])
            .timeout(self.status_timeout)
            .send()
            .await?;
        into_raw(response).await
    }
}
