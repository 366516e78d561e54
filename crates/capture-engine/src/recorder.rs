//! Canvas capture stream and media recorder collaborators.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use admock_common::error::{AdmockError, AdmockResult};
use image::RgbaImage;

use crate::video::AudioTrack;

/// Container/codec types tried in order of preference.
pub const MIME_CANDIDATES: [&str; 4] = [
    "video/webm;codecs=vp9,opus",
    "video/webm;codecs=vp8,opus",
    "video/webm",
    "video/mp4",
];

/// Live stream of composited canvas frames, plus the source's audio.
#[derive(Debug, Clone)]
pub struct CaptureStream {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub audio: Option<AudioTrack>,
    released: Arc<AtomicBool>,
}

impl CaptureStream {
    pub fn new(width: u32, height: u32, fps: u32, audio: Option<AudioTrack>) -> Self {
        Self {
            width,
            height,
            fps,
            audio,
            released: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Stop all tracks. Idempotent; clones share the flag.
    pub fn release(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            tracing::debug!(
                width = self.width,
                height = self.height,
                "Capture stream tracks released"
            );
        }
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

/// Encodes a [`CaptureStream`] into a container, one chunk at a time.
#[async_trait::async_trait]
pub trait MediaRecorder: Send {
    fn mime_type(&self) -> &str;

    async fn start(&mut self) -> AdmockResult<()>;

    /// Feed one composited frame presented at `timestamp`.
    async fn push_frame(&mut self, frame: &RgbaImage, timestamp: Duration) -> AdmockResult<()>;

    /// Flush and return every chunk produced. Called at most once.
    async fn stop(&mut self) -> AdmockResult<Vec<Vec<u8>>>;
}

/// Creates capture streams and recorders.
pub trait RecorderFactory: Send + Sync {
    fn is_type_supported(&self, mime: &str) -> bool;

    fn create(&self, stream: &CaptureStream, mime: &str) -> AdmockResult<Box<dyn MediaRecorder>>;

    /// Open a capture stream for a canvas of the given size.
    fn capture_stream(
        &self,
        width: u32,
        height: u32,
        fps: u32,
        audio: Option<AudioTrack>,
    ) -> AdmockResult<CaptureStream> {
        Ok(CaptureStream::new(width, height, fps, audio))
    }
}

/// First candidate the factory can record, or an unsupported error.
pub fn select_mime_type(factory: &dyn RecorderFactory) -> AdmockResult<&'static str> {
    MIME_CANDIDATES
        .iter()
        .copied()
        .find(|mime| factory.is_type_supported(mime))
        .ok_or_else(|| {
            AdmockError::unsupported(format!(
                "None of the recording formats are supported: {}",
                MIME_CANDIDATES.join(", ")
            ))
        })
}
