//! AdMock Capture Engine
//!
//! Everything that touches the live preview during an export: collaborator
//! traits for the host document, video, CTA animation and media recorder,
//! plus the overlay snapshotter and the recording session.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────┐
//! │                 PreviewDocument                   │
//! │   root ── [data-hide-bg-export] ── <video>        │
//! └──────┬──────────────────────────────┬─────────────┘
//!        │ StyleGuard + rasterize       │ VideoElement
//!        ▼                              ▼
//! ┌──────────────────┐   stage   ┌──────────────────┐
//! │ OverlaySnapshotter│◀─────────│ StageController  │
//! │  (key-color punch)│          └──────────────────┘
//! └────────┬─────────┘
//!          │ OverlaySet
//!          ▼
//! ┌───────────────────────────────────────────────────┐
//! │ RecordingSession ── CaptureStream ── MediaRecorder│
//! │        idle → recording → processing → done       │
//! └───────────────────────────────────────────────────┘
//! ```

pub mod dom;
pub mod ffmpeg;
pub mod recorder;
pub mod session;
pub mod snapshot;
pub mod stages;
pub mod style_guard;
pub mod video;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use dom::{ElementId, PreviewDocument, RasterizeOptions, VideoHandle, HIDE_BACKGROUND_ATTR};
pub use ffmpeg::{FfmpegPipeRecorder, FfmpegRecorderFactory};
pub use recorder::{select_mime_type, CaptureStream, MediaRecorder, RecorderFactory, MIME_CANDIDATES};
pub use session::{AbortHandle, RecordingSession};
pub use snapshot::{OverlayBitmap, OverlaySnapshotter};
pub use stages::{capture_stage_overlays, OverlaySet, StageController};
pub use style_guard::{StyleGuard, StyleSnapshot};
pub use video::{wait_until_playable, AudioTrack, PlaybackState, ReadyState, VideoElement, VideoFrame};
