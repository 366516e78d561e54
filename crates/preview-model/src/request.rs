//! Export requests and their outputs.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::platform::{ParseError, Placement, Platform};

/// Requested output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Png,
    Jpeg,
    Mp4,
}

impl ExportFormat {
    /// File extension without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Jpeg => "jpeg",
            ExportFormat::Mp4 => "mp4",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ExportFormat::Png => "image/png",
            ExportFormat::Jpeg => "image/jpeg",
            ExportFormat::Mp4 => "video/mp4",
        }
    }

    pub fn is_video(self) -> bool {
        matches!(self, ExportFormat::Mp4)
    }
}

impl FromStr for ExportFormat {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(ExportFormat::Png),
            "jpeg" | "jpg" => Ok(ExportFormat::Jpeg),
            "mp4" => Ok(ExportFormat::Mp4),
            other => Err(ParseError::UnknownFormat(other.to_string())),
        }
    }
}

/// Immutable description of one export.
///
/// The preview document and its video element are handed to the pipeline
/// separately as collaborator handles; this struct carries only plain data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRequest {
    pub format: ExportFormat,
    pub platform: Platform,
    pub placement: Placement,

    /// Whether the optional third CTA stage (content card) is enabled.
    #[serde(default)]
    pub show_card: bool,
}

impl ExportRequest {
    pub fn new(format: ExportFormat, platform: Platform, placement: impl Into<Placement>) -> Self {
        Self {
            format,
            platform,
            placement: placement.into(),
            show_card: false,
        }
    }

    pub fn with_card(mut self, show_card: bool) -> Self {
        self.show_card = show_card;
        self
    }

    /// `<platform>-ad-preview.<ext>` for image exports.
    pub fn image_filename(&self) -> String {
        format!(
            "{}-ad-preview.{}",
            self.platform.as_str(),
            self.format.extension()
        )
    }

    /// `<platform>-ad-preview-<unix-ms>.mp4` for video exports.
    pub fn video_filename(&self, unix_ms: i64) -> String {
        format!("{}-ad-preview-{unix_ms}.mp4", self.platform.as_str())
    }
}

/// A finished export ready to be offered for download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedFile {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ExportedFile {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
