use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::session::SessionContext;

/// One caller invocation. Immutable once built; `new` is the only way in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    prompt: String,
    seed_image: Option<String>,
}

impl GenerationRequest {
    /// Rejects empty or whitespace-only prompts. A blank seed image is
    /// treated as absent.
    pub fn new(
        prompt: impl Into<String>,
        seed_image: Option<String>,
    ) -> Result<Self, ValidationError> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(ValidationError::EmptyPrompt);
        }
        let seed_image = seed_image
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        Ok(Self { prompt, seed_image })
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn seed_image(&self) -> Option<&str> {
        self.seed_image.as_deref()
    }
}

/// Upstream-assigned handle for an accepted job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hand-off from submission to polling. The session is the one the
/// upstream accepted; status queries must present the same identity.
#[derive(Debug, Clone)]
pub struct SubmissionResult {
    pub job_id: JobId,
    pub session: SessionContext,
    pub attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationOutcome {
    pub final_asset_reference: String,
    pub used_fallback: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_blank_prompts() {
        for prompt in ["", "   ", "\n\t "] {
            assert_eq!(
                GenerationRequest::new(prompt, None),
                Err(ValidationError::EmptyPrompt)
            );
        }
    }

    #[test]
    fn test_blank_seed_image_is_absent() {
        let request = GenerationRequest::new("a cat", Some("  ".to_string())).unwrap();
        assert_eq!(request.seed_image(), None);

        let request =
            GenerationRequest::new("a cat", Some(" https://x.test/a.jpg ".into())).unwrap();
        assert_eq!(request.seed_image(), Some("https://x.test/a.jpg"));
    }
}
