//! Export lifecycle status and progress reports.

use serde::{Deserialize, Serialize};

/// Lifecycle of one export, as shown by the host's progress dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportStatus {
    Idle,
    Recording,
    Processing,
    Completed,
    Error,
}

impl ExportStatus {
    /// Whether `next` is a legal successor of `self`.
    ///
    /// `idle -> recording -> processing -> completed`, with `error`
    /// reachable from every non-terminal state.
    pub fn can_transition_to(self, next: ExportStatus) -> bool {
        use ExportStatus::*;
        matches!(
            (self, next),
            (Idle, Recording)
                | (Recording, Processing)
                | (Processing, Completed)
                | (Idle, Error)
                | (Recording, Error)
                | (Processing, Error)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ExportStatus::Completed | ExportStatus::Error)
    }
}

/// Progress report delivered to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportProgress {
    /// Percentage in `[0, 100]`.
    pub progress: f64,

    pub status: ExportStatus,

    /// Human-readable failure description when `status == Error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExportProgress {
    pub fn new(status: ExportStatus, progress: f64) -> Self {
        Self {
            progress: progress.clamp(0.0, 100.0),
            status,
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            progress: 0.0,
            status: ExportStatus::Error,
            error: Some(message.into()),
        }
    }

    pub fn completed() -> Self {
        Self::new(ExportStatus::Completed, 100.0)
    }
}
