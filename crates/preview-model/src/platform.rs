//! Platform and placement identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Social network whose ad layout the preview imitates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Facebook,
    Instagram,
    Tiktok,
    Linkedin,
}

impl Platform {
    pub const ALL: [Platform; 4] = [
        Platform::Facebook,
        Platform::Instagram,
        Platform::Tiktok,
        Platform::Linkedin,
    ];

    /// Lowercase identifier, also used as the filename prefix.
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Facebook => "facebook",
            Platform::Instagram => "instagram",
            Platform::Tiktok => "tiktok",
            Platform::Linkedin => "linkedin",
        }
    }

    /// Placement used when the editor did not specify one.
    pub fn default_placement(self) -> Placement {
        match self {
            Platform::Facebook | Platform::Instagram => Placement::new(Placement::FEED),
            Platform::Tiktok => Placement::new(Placement::IN_FEED),
            Platform::Linkedin => Placement::new(Placement::SINGLE),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure to parse a model identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("unknown platform: {0}")]
    UnknownPlatform(String),

    #[error("unknown export format: {0}")]
    UnknownFormat(String),
}

impl FromStr for Platform {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "facebook" | "fb" => Ok(Platform::Facebook),
            "instagram" | "ig" => Ok(Platform::Instagram),
            "tiktok" => Ok(Platform::Tiktok),
            "linkedin" => Ok(Platform::Linkedin),
            other => Err(ParseError::UnknownPlatform(other.to_string())),
        }
    }
}

/// A platform-scoped ad surface name ("feed", "reels", "story", ...).
///
/// Placements are free-form strings owned by the editor; the geometry
/// tables match on the normalized (trimmed, lowercase) form and fall back to
/// platform defaults for names they do not know.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Placement(String);

impl Placement {
    pub const FEED: &'static str = "feed";
    pub const STORY: &'static str = "story";
    pub const REELS: &'static str = "reels";
    pub const SINGLE: &'static str = "single";
    pub const IN_FEED: &'static str = "in-feed";

    pub fn new(name: impl AsRef<str>) -> Self {
        Self(name.as_ref().trim().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is(&self, name: &str) -> bool {
        self.0 == name
    }
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Placement {
    fn from(value: &str) -> Self {
        Placement::new(value)
    }
}
