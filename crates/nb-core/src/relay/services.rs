use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use super::{Asset, RelayService};
use crate::error::RelayError;

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(30);

fn file_part(asset: &Asset) -> Result<Part, reqwest::Error> {
    Part::bytes(asset.bytes.clone())
        .file_name(asset.file_name.clone())
        .mime_str(asset.mime)
}

/// uguu.se: multipart `files[]`, JSON reply listing the hosted files.
pub struct UguuRelay {
    http: Client,
    endpoint: String,
}

impl UguuRelay {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            endpoint: endpoint.into(),
        }
    }

    fn error(&self, reason: impl ToString) -> RelayError {
        RelayError::Upload {
            service: self.name().to_string(),
            reason: reason.to_string(),
        }
    }
}

impl Default for UguuRelay {
    fn default() -> Self {
        Self::new("https://uguu.se/upload")
    }
}

#[derive(Debug, Deserialize)]
struct UguuReply {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    files: Vec<UguuFile>,
}

#[derive(Debug, Deserialize)]
struct UguuFile {
    url: Option<String>,
}

#[async_trait]
impl RelayService for UguuRelay {
    fn name(&self) -> &str {
        "uguu.se"
    }

    async fn upload(&self, asset: &Asset) -> Result<String, RelayError> {
        let form = Form::new().part("files[]", file_part(asset).map_err(|e| self.error(e))?);
        let response = self
            .http
            .post(&self.endpoint)
            .multipart(form)
            .timeout(UPLOAD_TIMEOUT)
            .send()
            .await
            .map_err(|e| self.error(e))?;
        if !response.status().is_success() {
            return Err(self.error(format!("HTTP {}", response.status())));
        }
        let reply: UguuReply = response.json().await.map_err(|e| self.error(e))?;
        if !reply.success {
            return Err(self.error("service reported failure"));
        }
        reply
            .files
            .into_iter()
            .find_map(|file| file.url)
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| self.error("reply carried no file url"))
    }
}

/// 0x0.st: multipart `file`, plain-text url reply.
pub struct ZeroXZeroRelay {
    http: Client,
    endpoint: String,
}

impl ZeroXZeroRelay {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            endpoint: endpoint.into(),
        }
    }

    fn error(&self, reason: impl ToString) -> RelayError {
        RelayError::Upload {
            service: self.name().to_string(),
            reason: reason.to_string(),
        }
    }
}

impl Default for ZeroXZeroRelay {
    fn default() -> Self {
        Self::new("https://0x0.st")
    }
}

#[async_trait]
impl RelayService for ZeroXZeroRelay {
    fn name(&self) -> &str {
        "0x0.st"
    }

    async fn upload(&self, asset: &Asset) -> Result<String, RelayError> {
        let form = Form::new().part("file", file_part(asset).map_err(|e| self.error(e))?);
        let response = self
            .http
            .post(&self.endpoint)
            .multipart(form)
            .timeout(UPLOAD_TIMEOUT)
            .send()
            .await
            .map_err(|e| self.error(e))?;
        if !response.status().is_success() {
            return Err(self.error(format!("HTTP {}", response.status())));
        }
        let body = response.text().await.map_err(|e| self.error(e))?;
        let url = body.trim();
        if url.starts_with("http") {
            Ok(url.to_string())
        } else {
            Err(self.error(format!("unexpected reply: {url}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uguu_reply_shape() {
        let reply: UguuReply = serde_json::from_str(
            r#"{"success":true,"files":[{"hash":"x","url":"https://a.uguu.se/abc.png"}]}"#,
        )
        .unwrap();
        assert!(reply.success);
        assert_eq!(reply.files[0].url.as_deref(), Some("https://a.uguu.se/abc.png"));

        let reply: UguuReply = serde_json::from_str(r#"{"success":false}"#).unwrap();
        assert!(reply.files.is_empty());
    }
}
