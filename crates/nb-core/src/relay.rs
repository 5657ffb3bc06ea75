//! Moves a finished asset from the upstream's short-lived url onto a
//! public file host.

mod services;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::USER_AGENT;
use reqwest::{Client, Url};
use tracing::{info, warn};

use crate::error::RelayError;

pub use services::{UguuRelay, ZeroXZeroRelay};

pub const MIN_ASSET_BYTES: usize = 1000;

/// Downloaded (or uploaded) image bytes plus what a file host needs to
/// accept them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub mime: &'static str,
}

impl Asset {
    /// Names the asset after the last path segment of `url`, or a
    /// timestamped name when the url has none.
    pub fn from_download(url: &str, bytes: Vec<u8>) -> Self {
        let name = Url::parse(url).ok().and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        });
        Self::named(name.as_deref(), bytes)
    }

    pub fn named(file_name: Option<&str>, bytes: Vec<u8>) -> Self {
        let format = image::guess_format(&bytes).ok();
        let mime = format.map(|f| f.to_mime_type()).unwrap_or("image/jpeg");
        let file_name = match file_name.map(str::trim) {
            Some(name) if !name.is_empty() && name.contains('.') => name.to_string(),
            _ => {
                let ext = format
                    .and_then(|f| f.extensions_str().first().copied())
                    .unwrap_or("jpg");
                format!("generated_image_{}.{}", Utc::now().timestamp(), ext)
            }
        };
        Self {
            bytes,
            file_name,
            mime,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.bytes.len()
    }
}

#[async_trait]
pub trait AssetFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Asset, RelayError>;
}

#[async_trait]
pub trait RelayService: Send + Sync {
    fn name(&self) -> &str;
    async fn upload(&self, asset: &Asset) -> Result<String, RelayError>;
}

pub struct HttpFetcher {
    http: Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AssetFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Asset, RelayError> {
        info!(%url, "downloading generated image");
        let response = self
            .http
            .get(url)
            .header(USER_AGENT, "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|err| RelayError::Download(err.to_string()))?;
        if !response.status().is_success() {
            return Err(RelayError::Download(format!("HTTP {}", response.status())));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|err| RelayError::Download(err.to_string()))?;
        Ok(Asset::from_download(url, bytes.to_vec()))
    }
}

pub fn default_services() -> Vec<Arc<dyn RelayService>> {
    vec![
        Arc::new(UguuRelay::default()),
        Arc::new(ZeroXZeroRelay::default()),
    ]
}

pub struct ResultRelay {
    fetcher: Arc<dyn AssetFetcher>,
    services: Vec<Arc<dyn RelayService>>,
    min_bytes: usize,
}

impl ResultRelay {
    pub fn new(fetcher: Arc<dyn AssetFetcher>, services: Vec<Arc<dyn RelayService>>) -> Self {
        Self {
            fetcher,
            services,
            min_bytes: MIN_ASSET_BYTES,
        }
    }

    pub fn with_min_bytes(mut self, min_bytes: usize) -> Self {
        self.min_bytes = min_bytes;
        self
    }

    /// Downloads `source_url` and re-hosts it on the first relay service
    /// that accepts it. When every service fails the source url itself is
    /// returned; only the download can fail this call.
    pub async fn relocate(&self, source_url: &str) -> Result<String, RelayError> {
        let asset = self.fetcher.fetch(source_url).await?;
        info!("downloaded image: {} bytes", asset.len());

        match self.try_services(&asset).await {
            Ok(url) => Ok(url),
            Err(_) => {
                warn!("all relay services failed, returning original url");
                Ok(source_url.to_string())
            }
        }
    }

    /// Re-hosts caller-supplied bytes. Unlike [`ResultRelay::relocate`]
    /// there is no source url to degrade to, so exhaustion is an error.
    pub async fn upload(&self, asset: &Asset) -> Result<String, RelayError> {
        self.validate(asset)?;
        self.try_services(asset).await
    }

    pub fn validate(&self, asset: &Asset) -> Result<(), RelayError> {
        if asset.len() < self.min_bytes {
            return Err(RelayError::PayloadTooSmall(asset.len()));
        }
        Ok(())
    }

    async fn try_services(&self, asset: &Asset) -> Result<String, RelayError> {
        for service in &self.services {
            let attempt = match self.validate(asset) {
                Ok(()) => service.upload(asset).await,
                Err(err) => Err(err),
            };
            match attempt {
                Ok(url) => {
                    info!("upload successful to {}: {}", service.name(), url);
                    return Ok(url);
                }
                Err(err) => warn!("relay via {} failed: {}", service.name(), err),
            }
        }
        Err(RelayError::Exhausted)
    }
}
