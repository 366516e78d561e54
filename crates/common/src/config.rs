//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{AdmockError, AdmockResult};

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Export pipeline tunables.
    #[serde(default)]
    pub export: ExportSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Tunables for the export pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    /// Output frame rate of the recorded canvas.
    pub fps: u32,

    /// Device pixel ratio used for every snapshot and the canvas.
    pub pixel_ratio: u32,

    /// Reserved RGB value punched out of overlay snapshots.
    pub key_color: [u8; 3],

    /// Playback times (seconds) at which the CTA advances to stage 1 and 2.
    pub stage_thresholds_secs: [f64; 2],

    /// Maximum wait for the source video to become playable.
    pub ready_timeout_ms: u64,

    /// Fallback delay after DOM mutation when no paint signal exists.
    pub settle_delay_ms: u64,

    /// Frames allowed past the duration estimate before the loop stops.
    pub frame_grace: u64,

    /// Report progress every N rendered frames.
    pub progress_interval_frames: u64,

    /// Allowed snapshot size deviation from the canvas, in pixels.
    pub size_tolerance_px: u32,

    /// Constant rate factor for the H.264 transcode.
    pub crf: u8,

    /// x264 preset for the transcode.
    pub preset: String,

    /// ffmpeg executable used by the native recorder and transcoder.
    pub ffmpeg_binary: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "admock=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            fps: 30,
            pixel_ratio: 2,
            key_color: [1, 2, 3],
            stage_thresholds_secs: [1.5, 3.0],
            ready_timeout_ms: 5_000,
            settle_delay_ms: 150,
            frame_grace: 15,
            progress_interval_frames: 10,
            size_tolerance_px: 2,
            crf: 23,
            preset: "medium".to_string(),
            ffmpeg_binary: "ffmpeg".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl ExportSettings {
    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> AdmockResult<()> {
        if self.fps == 0 {
            return Err(AdmockError::config("fps must be greater than zero"));
        }
        if self.pixel_ratio == 0 {
            return Err(AdmockError::config("pixel_ratio must be greater than zero"));
        }
        let [first, second] = self.stage_thresholds_secs;
        if !(first > 0.0 && second > first) {
            return Err(AdmockError::config(format!(
                "stage thresholds must be positive and increasing, got {first} and {second}"
            )));
        }
        if self.progress_interval_frames == 0 {
            return Err(AdmockError::config(
                "progress_interval_frames must be greater than zero",
            ));
        }
        Ok(())
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match Self::from_json(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Parse and validate a JSON config document.
    pub fn from_json(content: &str) -> AdmockResult<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.export.validate()?;
        Ok(config)
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("admock").join("config.json")
}
