use serde::{Deserialize, Serialize};

/// Where a lifecycle currently is.
///
/// `Init → Submitting → Polling → Relaying → Done`, with `Fallback`
/// reachable from `Submitting` and `Polling`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStage {
    Init,
    Submitting,
    Polling,
    Relaying,
    Fallback,
    Done,
}

impl LifecycleStage {
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            Self::Submitting | Self::Polling | Self::Relaying | Self::Fallback
        )
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Done)
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Init => "Waiting to start",
            Self::Submitting => "Submitting to upstream",
            Self::Polling => "Generating",
            Self::Relaying => "Uploading result",
            Self::Fallback => "Using fallback provider",
            Self::Done => "Finished",
        }
    }
}

/// Caller-visible task state, as reported on the progress surface.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl TaskStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Queued | Self::Running)
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_activity() {
        assert!(!LifecycleStage::Init.is_active());
        assert!(LifecycleStage::Polling.is_active());
        assert!(LifecycleStage::Fallback.is_active());
        assert!(LifecycleStage::Done.is_complete());
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(
            serde_json::to_string(&LifecycleStage::Relaying).unwrap(),
            "\"relaying\""
        );
        assert_eq!(
            serde_json::to_string(&TaskStatus::Succeeded).unwrap(),
            "\"succeeded\""
        );
    }
}
