use async_trait::async_trait;
use tracing::info;

use crate::error::FallbackError;
use crate::request::GenerationRequest;
use crate::truncate_for_log;

pub const DEFAULT_PLACEHOLDER_URL: &str = "https://picsum.photos/1024/1024";

/// Substitute asset source for when the primary upstream cannot finish.
#[async_trait]
pub trait FallbackProvider: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, FallbackError>;
}

/// Hands back a fixed placeholder image reference.
#[derive(Debug, Clone)]
pub struct PlaceholderFallback {
    url: String,
}

impl PlaceholderFallback {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into().trim().to_string(),
        }
    }
}

impl Default for PlaceholderFallback {
    fn default() -> Self {
        Self::new(DEFAULT_PLACEHOLDER_URL)
    }
}

#[async_trait]
impl FallbackProvider for PlaceholderFallback {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, FallbackError> {
        if self.url.is_empty() {
            return Err(FallbackError::Unconfigured);
        }
        info!(
            prompt = %truncate_for_log(request.prompt(), 50),
            url = %self.url,
            "using fallback image"
        );
        Ok(self.url.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_placeholder_is_deterministic() {
        let request = GenerationRequest::new("a lighthouse", None).unwrap();
        let fallback = PlaceholderFallback::default();
        assert_eq!(
            fallback.generate(&request).await.unwrap(),
            DEFAULT_PLACEHOLDER_URL
        );
        assert_eq!(
            fallback.generate(&request).await,
            fallback.generate(&request).await
        );
    }

    #[tokio::test]
    async fn test_blank_placeholder_is_an_error() {
        let request = GenerationRequest::new("a lighthouse", None).unwrap();
        assert_eq!(
            PlaceholderFallback::new("  ").generate(&request).await,
            Err(FallbackError::Unconfigured)
        );
    }
}
