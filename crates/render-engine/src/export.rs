//! Export orchestration: one request in, one downloadable file out.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use admock_capture_engine::dom::{PreviewDocument, VideoHandle};
use admock_capture_engine::recorder::RecorderFactory;
use admock_capture_engine::session::{AbortHandle, RecordingSession};
use admock_capture_engine::snapshot::OverlaySnapshotter;
use admock_capture_engine::stages::{capture_stage_overlays, OverlaySet, StageController};
use admock_capture_engine::video::{wait_until_playable, PlaybackState, VideoElement};
use admock_common::clock::{ExportClock, FrameCadence};
use admock_common::config::ExportSettings;
use admock_common::error::{AdmockError, AdmockResult};
use admock_preview_model::geometry::CanvasSize;
use admock_preview_model::request::{ExportFormat, ExportRequest, ExportedFile};
use admock_preview_model::status::{ExportProgress, ExportStatus};
use admock_processing_core::frame_budget::{FrameBudget, StopReason};
use admock_processing_core::geometry::{resolve_draw_area, AreaContext, VideoLayout};
use admock_processing_core::stages::{requires_staged_cta, StageSchedule};
use image::{DynamicImage, ImageFormat, Rgba};

use crate::compositor::FrameCompositor;
use crate::render_loop::run_render_loop;
use crate::transcode::{transcode_to_container, EncoderLoader, TranscodeSettings};

/// Progress callback for exports.
pub type ProgressCallback = Box<dyn Fn(ExportProgress) + Send + Sync>;

/// Caller-side handle used to dismiss a running export.
#[derive(Debug, Clone, Default)]
pub struct ExportHandle {
    abort: AbortHandle,
}

impl ExportHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the export to stop. The recorder is stopped on the next tick and
    /// the export ends with [`AdmockError::Aborted`].
    pub fn abort(&self) {
        self.abort.abort();
    }

    pub fn is_aborted(&self) -> bool {
        self.abort.is_aborted()
    }
}

/// Host collaborators for one export.
pub struct ExportContext<'a> {
    pub document: &'a dyn PreviewDocument,
    /// Needed only for placements with a staged CTA.
    pub stages: Option<&'a dyn StageController>,
    pub recorders: &'a dyn RecorderFactory,
    pub encoder: &'a dyn EncoderLoader,
    pub settings: ExportSettings,
}

/// Forwards status changes to the host, reporting a failure at most once.
struct ProgressReporter<'a> {
    callback: Option<&'a ProgressCallback>,
}

impl ProgressReporter<'_> {
    fn report(&self, status: ExportStatus, progress: f64) {
        if let Some(cb) = self.callback {
            cb(ExportProgress::new(status, progress));
        }
    }

    fn fail(&self, err: &AdmockError) {
        if let Some(cb) = self.callback {
            cb(ExportProgress::failed(err.user_message()));
        }
    }

    fn complete(&self) {
        if let Some(cb) = self.callback {
            cb(ExportProgress::completed());
        }
    }
}

/// Run the export matching `request.format`.
pub async fn export(
    ctx: &ExportContext<'_>,
    request: &ExportRequest,
    handle: &ExportHandle,
    progress: Option<&ProgressCallback>,
) -> AdmockResult<ExportedFile> {
    if request.format.is_video() {
        export_video(ctx, request, handle, progress).await
    } else {
        let reporter = ProgressReporter { callback: progress };
        match export_image(ctx.document, request, &ctx.settings).await {
            Ok(file) => {
                reporter.complete();
                Ok(file)
            }
            Err(e) => {
                reporter.fail(&e);
                Err(e)
            }
        }
    }
}

/// Record the preview with its playing video and return an MP4.
pub async fn export_video(
    ctx: &ExportContext<'_>,
    request: &ExportRequest,
    handle: &ExportHandle,
    progress: Option<&ProgressCallback>,
) -> AdmockResult<ExportedFile> {
    let reporter = ProgressReporter { callback: progress };
    let clock = ExportClock::start();
    tracing::info!(
        platform = %request.platform,
        placement = %request.placement,
        show_card = request.show_card,
        "Starting video export"
    );

    let result = record_and_transcode(ctx, request, handle, &reporter).await;
    match result {
        Ok(bytes) => {
            let file = ExportedFile {
                filename: request.video_filename(clock.started_unix_ms()),
                mime_type: ExportFormat::Mp4.mime_type().to_string(),
                bytes,
            };
            tracing::info!(
                filename = %file.filename,
                bytes = file.bytes.len(),
                elapsed_secs = clock.elapsed_secs(),
                "Video export finished"
            );
            reporter.complete();
            Ok(file)
        }
        Err(e) => {
            match &e {
                AdmockError::Aborted => tracing::info!("Video export aborted"),
                _ => tracing::error!(error = %e, kind = ?e.kind(), "Video export failed"),
            }
            reporter.fail(&e);
            Err(e)
        }
    }
}

async fn record_and_transcode(
    ctx: &ExportContext<'_>,
    request: &ExportRequest,
    handle: &ExportHandle,
    reporter: &ProgressReporter<'_>,
) -> AdmockResult<Vec<u8>> {
    ctx.settings.validate()?;
    let settings = &ctx.settings;
    let doc = ctx.document;

    let video = doc.find_video().ok_or(AdmockError::NoVideoFound)?;
    let video_size = video.media.video_size();
    if video_size.0 == 0 || video_size.1 == 0 {
        return Err(AdmockError::setup("Video has no dimensions yet"));
    }
    let canvas = canvas_size(doc, settings.pixel_ratio)?;

    let saved = PlaybackState::capture(video.media.as_ref());
    video.media.set_muted(true);
    video.media.set_looping(false);

    let recorded = record(ctx, request, handle, reporter, &video, video_size, canvas).await;

    video.media.pause();
    saved.restore(video.media.as_ref()).await;

    let raw = recorded?;
    reporter.report(ExportStatus::Processing, 99.0);
    transcode_to_container(ctx.encoder, &raw, &TranscodeSettings::from(settings)).await
}

async fn record(
    ctx: &ExportContext<'_>,
    request: &ExportRequest,
    handle: &ExportHandle,
    reporter: &ProgressReporter<'_>,
    video: &VideoHandle,
    video_size: (u32, u32),
    canvas: CanvasSize,
) -> AdmockResult<Vec<u8>> {
    let settings = &ctx.settings;
    let doc = ctx.document;
    let media: &dyn VideoElement = video.media.as_ref();

    let area = resolve_draw_area(
        &AreaContext {
            canvas,
            pixel_ratio: settings.pixel_ratio,
            layout: video_layout(doc, video),
        },
        request.platform,
        &request.placement,
    );

    let snapshotter = OverlaySnapshotter::from_settings(settings);
    let overlays = capture_overlays(ctx, request, &snapshotter, canvas).await;
    if handle.is_aborted() {
        return Err(AdmockError::Aborted);
    }

    media.seek(0.0);
    wait_until_playable(media, Duration::from_millis(settings.ready_timeout_ms)).await?;
    media.play().await.map_err(|e| match e {
        AdmockError::Playback { .. } => e,
        other => AdmockError::playback(other.to_string()),
    })?;

    let cadence = FrameCadence::new(settings.fps);
    let audio = media.audio_tracks().into_iter().next();
    let stream = ctx
        .recorders
        .capture_stream(canvas.width, canvas.height, cadence.fps(), audio)?;
    let budget = FrameBudget::new(cadence.estimate_frames(media.duration()), settings.frame_grace);
    let mut session = RecordingSession::new(cadence, budget, handle.abort.clone());
    session.start(ctx.recorders, stream).await?;
    reporter.report(ExportStatus::Recording, 0.0);

    let mut compositor = FrameCompositor::new(canvas, area, video_size, overlays);
    let on_progress = |pct: f64| reporter.report(ExportStatus::Recording, pct);
    let outcome = match run_render_loop(
        media,
        &mut compositor,
        &mut session,
        cadence,
        settings.progress_interval_frames,
        &on_progress,
    )
    .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            session.fail();
            return Err(e);
        }
    };

    if outcome.reason == StopReason::Aborted {
        session.fail();
        return Err(AdmockError::Aborted);
    }
    session.take_output()
}

async fn capture_overlays(
    ctx: &ExportContext<'_>,
    request: &ExportRequest,
    snapshotter: &OverlaySnapshotter,
    canvas: CanvasSize,
) -> OverlaySet {
    let default_overlay = snapshotter.capture_overlay(ctx.document, canvas).await;
    if !requires_staged_cta(request.platform, &request.placement) {
        return OverlaySet::Single(default_overlay);
    }
    let Some(stages) = ctx.stages else {
        tracing::warn!(
            platform = %request.platform,
            "Staged CTA placement without a stage controller; using a single overlay"
        );
        return OverlaySet::Single(default_overlay);
    };
    let schedule = StageSchedule::from_settings(&ctx.settings, request.show_card);
    capture_stage_overlays(ctx.document, stages, snapshotter, canvas, schedule, &default_overlay)
        .await
}

fn canvas_size(doc: &dyn PreviewDocument, pixel_ratio: u32) -> AdmockResult<CanvasSize> {
    let bounds = doc
        .bounding_box(doc.root())
        .ok_or_else(|| AdmockError::setup("Preview root is not attached"))?;
    let canvas = CanvasSize::from_css(bounds.width, bounds.height, pixel_ratio);
    if canvas.is_empty() {
        return Err(AdmockError::setup(format!(
            "Preview root has no area ({}x{} CSS px)",
            bounds.width, bounds.height
        )));
    }
    Ok(canvas)
}

fn video_layout(doc: &dyn PreviewDocument, video: &VideoHandle) -> Option<VideoLayout> {
    Some(VideoLayout {
        container: doc.bounding_box(doc.root())?,
        video: doc.bounding_box(video.element)?,
    })
}

/// Rasterize the preview to a PNG or JPEG.
pub async fn export_image(
    document: &dyn PreviewDocument,
    request: &ExportRequest,
    settings: &ExportSettings,
) -> AdmockResult<ExportedFile> {
    let format = match request.format {
        ExportFormat::Png => ImageFormat::Png,
        ExportFormat::Jpeg => ImageFormat::Jpeg,
        ExportFormat::Mp4 => {
            return Err(AdmockError::unsupported("export_image cannot produce video"))
        }
    };
    settings.validate()?;
    let canvas = canvas_size(document, settings.pixel_ratio)?;
    let snapshotter = OverlaySnapshotter::from_settings(settings);

    // JPEG has no alpha channel.
    let background = (format == ImageFormat::Jpeg).then_some(Rgba([255, 255, 255, 255]));
    let still = snapshotter.capture_still(document, canvas, background).await?;

    let image = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(still).to_rgb8()),
        _ => DynamicImage::ImageRgba8(still),
    };
    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, format)?;
    let bytes = bytes.into_inner();

    tracing::info!(
        platform = %request.platform,
        format = ?request.format,
        width = canvas.width,
        height = canvas.height,
        bytes = bytes.len(),
        "Image export finished"
    );
    Ok(ExportedFile {
        filename: request.image_filename(),
        mime_type: request.format.mime_type().to_string(),
        bytes,
    })
}

/// Shared-ownership variant of [`ExportContext`] for hosts that spawn the
/// export onto its own task.
#[derive(Clone)]
pub struct SharedExportContext {
    pub document: Arc<dyn PreviewDocument>,
    pub stages: Option<Arc<dyn StageController>>,
    pub recorders: Arc<dyn RecorderFactory>,
    pub encoder: Arc<dyn EncoderLoader>,
    pub settings: ExportSettings,
}

impl SharedExportContext {
    pub fn borrow(&self) -> ExportContext<'_> {
        ExportContext {
            document: self.document.as_ref(),
            stages: self.stages.as_deref(),
            recorders: self.recorders.as_ref(),
            encoder: self.encoder.as_ref(),
            settings: self.settings.clone(),
        }
    }

    /// Spawn the export; the returned handle aborts it.
    pub fn spawn(
        &self,
        request: ExportRequest,
        progress: Option<ProgressCallback>,
    ) -> (ExportHandle, tokio::task::JoinHandle<AdmockResult<ExportedFile>>) {
        let handle = ExportHandle::new();
        let ctx = self.clone();
        let task_handle = handle.clone();
        let task = tokio::spawn(async move {
            let borrowed = ctx.borrow();
            export(&borrowed, &request, &task_handle, progress.as_ref()).await
        });
        (handle, task)
    }
}
