//! Error types shared across AdMock crates.

/// Top-level error type for export operations.
#[derive(Debug, thiserror::Error)]
pub enum AdmockError {
    #[error("No video found in the preview")]
    NoVideoFound,

    #[error("Setup error: {message}")]
    Setup { message: String },

    #[error("Playback error: {message}")]
    Playback { message: String },

    #[error("Capture error: {message}")]
    Capture { message: String },

    #[error("Recording error: {message}")]
    Recording { message: String },

    #[error("Recording produced no data")]
    EmptyRecording,

    #[error("Transcoding error: {message}")]
    Transcode { message: String },

    #[error("Export aborted")]
    Aborted,

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using AdmockError.
pub type AdmockResult<T> = Result<T, AdmockError>;

/// Coarse classification used when reporting a failure to the host UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Preconditions not met; nothing was recorded.
    Setup,
    /// Overlay capture degraded. Never fatal on its own.
    Capture,
    /// The video refused to play.
    Playback,
    /// Nothing usable was captured.
    Recording,
    /// Capture succeeded but packaging failed.
    Transcode,
    /// The user dismissed the export.
    Aborted,
    Internal,
}

impl AdmockError {
    pub fn setup(msg: impl Into<String>) -> Self {
        Self::Setup {
            message: msg.into(),
        }
    }

    pub fn playback(msg: impl Into<String>) -> Self {
        Self::Playback {
            message: msg.into(),
        }
    }

    pub fn capture(msg: impl Into<String>) -> Self {
        Self::Capture {
            message: msg.into(),
        }
    }

    pub fn recording(msg: impl Into<String>) -> Self {
        Self::Recording {
            message: msg.into(),
        }
    }

    pub fn transcode(msg: impl Into<String>) -> Self {
        Self::Transcode {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }

    /// Which bucket of the failure taxonomy this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoVideoFound | Self::Setup { .. } | Self::Config { .. } => ErrorKind::Setup,
            Self::Unsupported { .. } => ErrorKind::Setup,
            Self::Playback { .. } => ErrorKind::Playback,
            Self::Capture { .. } => ErrorKind::Capture,
            Self::Recording { .. } | Self::EmptyRecording => ErrorKind::Recording,
            Self::Transcode { .. } => ErrorKind::Transcode,
            Self::Aborted => ErrorKind::Aborted,
            Self::Io(_) | Self::Json(_) | Self::Image(_) | Self::Other(_) => ErrorKind::Internal,
        }
    }

    /// Message suitable for the export progress dialog.
    pub fn user_message(&self) -> String {
        match self.kind() {
            ErrorKind::Recording => format!("Recording failed: {self}"),
            ErrorKind::Transcode => format!("Video was recorded but could not be converted to MP4: {self}"),
            ErrorKind::Playback => format!("The video could not be played for export: {self}"),
            ErrorKind::Aborted => "Export was cancelled".to_string(),
            _ => self.to_string(),
        }
    }
}
