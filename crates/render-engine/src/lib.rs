//! AdMock Render Engine
//!
//! Real-time compositing of a live preview video under its rasterized UI
//! overlay, recorded and packaged as a downloadable file.
//!
//! # Pipeline Architecture
//!
//! ```text
//! preview document ──┬── overlay snapshot(s) ─────────┐
//!                    │                                │
//!                    └── <video> ── draw area/fit ────┤
//!                                                     ▼
//!                                   ┌───────────────────────────────┐
//!                                   │ render loop (30 fps)          │
//!                                   │   clear → video → overlay     │
//!                                   └──────────────┬────────────────┘
//!                                                  │ frames
//!                                                  ▼
//!                                          MediaRecorder (WebM)
//!                                                  │
//!                                                  ▼
//!                                     Transcode (H.264/AAC, +faststart)
//!                                                  │
//!                                                  ▼
//!                                  <platform>-ad-preview-<ts>.mp4
//! ```

pub mod canvas;
pub mod compositor;
pub mod export;
pub mod render_loop;
pub mod transcode;

pub use canvas::Canvas;
pub use compositor::FrameCompositor;
pub use export::{
    export, export_image, export_video, ExportContext, ExportHandle, ProgressCallback,
    SharedExportContext,
};
pub use render_loop::{run_render_loop, LoopOutcome};
pub use transcode::{
    transcode_args, transcode_to_container, EncoderEngine, EncoderLoader, EncoderModule,
    FfmpegEncoderLoader, FfmpegProcessEncoder, FileApiEncoder, FsOp, FsResult, LegacyFsEncoder,
    RunCallback, TranscodeSettings,
};
