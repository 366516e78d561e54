//! Clock and cadence utilities for the export render loop.
//!
//! The render loop runs at a fixed cadence decoupled from any display
//! refresh. This module provides:
//! - The per-export wall/monotonic anchor used for logging and filenames
//! - Fixed-rate frame cadence math
//! - Duration-derived frame estimates

use std::time::{Duration, Instant};

/// Anchor for a single export: monotonic start plus the wall-clock
/// timestamp that ends up in the video filename.
#[derive(Debug, Clone)]
pub struct ExportClock {
    started: Instant,
    started_unix_ms: i64,
}

impl ExportClock {
    /// Anchor a clock at the current instant.
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
            started_unix_ms: unix_timestamp_ms(),
        }
    }

    /// Seconds since the export started.
    pub fn elapsed_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    /// Unix epoch milliseconds at export start.
    pub fn started_unix_ms(&self) -> i64 {
        self.started_unix_ms
    }
}

/// Current wall-clock time as Unix epoch milliseconds.
pub fn unix_timestamp_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Fixed frame cadence, e.g. 30 fps ticks every 33.3ms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCadence {
    fps: u32,
}

impl FrameCadence {
    /// Create a cadence targeting the given rate. Zero is treated as one.
    pub fn new(fps: u32) -> Self {
        Self { fps: fps.max(1) }
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    /// Time between consecutive ticks.
    pub fn interval(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / self.fps as u64)
    }

    /// Number of frames needed to cover `duration_secs` of playback.
    ///
    /// Non-finite or non-positive durations (live streams, missing metadata)
    /// yield `None`.
    pub fn estimate_frames(&self, duration_secs: f64) -> Option<u64> {
        if !duration_secs.is_finite() || duration_secs <= 0.0 {
            return None;
        }
        Some((duration_secs * self.fps as f64).ceil() as u64)
    }

    /// Presentation timestamp of a frame index.
    pub fn timestamp_of(&self, frame_index: u64) -> Duration {
        let interval_nanos = 1_000_000_000 / self.fps as u64;
        Duration::from_nanos(interval_nanos.saturating_mul(frame_index))
    }
}
