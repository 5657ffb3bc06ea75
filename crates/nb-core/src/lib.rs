pub mod cancel;
pub mod error;
pub mod fallback;
pub mod job;
pub mod orchestrator;
pub mod poll;
pub mod progress;
pub mod relay;
pub mod request;
pub mod retry;
pub mod session;
pub mod submit;
pub mod upstream;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use cancel::{CancelHandle, CancelSignal};
pub use error::{
    FallbackError, GenerationError, PollError, RelayError, SubmissionError, TransportError,
    ValidationError,
};
pub use job::{LifecycleStage, TaskStatus};
pub use orchestrator::{LifecycleSettings, Orchestrator};
pub use progress::{MemoryProgressStore, ProgressSink, ProgressStore, ProgressUpdate};
pub use request::{GenerationOutcome, GenerationRequest, JobId, SubmissionResult};
pub use session::SessionContext;

/// Shortens `text` to at most `max_chars` characters for log lines.
pub fn truncate_for_log(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}
