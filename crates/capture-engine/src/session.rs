//! Recording session state machine.
//!
//! ```text
//! idle ──start──▶ recording ──stop──▶ processing ──complete──▶ completed
//!   │                 │                    │
//!   └─────────────────┴──────fail──────────┴──────────────────▶ error
//! ```
//!
//! The recorder is stopped at most once. Frames offered after the stop are
//! rejected before they reach it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use admock_common::clock::FrameCadence;
use admock_common::error::{AdmockError, AdmockResult};
use admock_preview_model::status::ExportStatus;
use admock_processing_core::frame_budget::{stop_reason, FrameBudget, StopReason};
use image::RgbaImage;

use crate::recorder::{select_mime_type, CaptureStream, MediaRecorder, RecorderFactory};

/// Shared cancellation flag for one export.
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        if !self.0.swap(true, Ordering::SeqCst) {
            tracing::info!("Export abort requested");
        }
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One canvas recording, from first frame to joined output.
pub struct RecordingSession {
    state: ExportStatus,
    stream: Option<CaptureStream>,
    recorder: Option<Box<dyn MediaRecorder>>,
    mime_type: Option<String>,
    chunks: Vec<Vec<u8>>,
    frames_rendered: u64,
    ticks_skipped: u64,
    budget: FrameBudget,
    cadence: FrameCadence,
    last_video_time: f64,
    stopped: bool,
    abort: AbortHandle,
}

impl RecordingSession {
    pub fn new(cadence: FrameCadence, budget: FrameBudget, abort: AbortHandle) -> Self {
        Self {
            state: ExportStatus::Idle,
            stream: None,
            recorder: None,
            mime_type: None,
            chunks: Vec::new(),
            frames_rendered: 0,
            ticks_skipped: 0,
            budget,
            cadence,
            last_video_time: 0.0,
            stopped: false,
            abort,
        }
    }

    pub fn state(&self) -> ExportStatus {
        self.state
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered
    }

    /// Ticks that passed without a decodable frame.
    pub fn ticks_skipped(&self) -> u64 {
        self.ticks_skipped
    }

    /// Note a tick that produced no frame. Skipped ticks still count
    /// against the frame budget, so a stalled source cannot hold the
    /// recorder open.
    pub fn skip_tick(&mut self) {
        self.ticks_skipped += 1;
    }

    pub fn budget(&self) -> &FrameBudget {
        &self.budget
    }

    pub fn last_video_time(&self) -> f64 {
        self.last_video_time
    }

    pub fn mime_type(&self) -> Option<&str> {
        self.mime_type.as_deref()
    }

    pub fn abort_handle(&self) -> &AbortHandle {
        &self.abort
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Progress of the recording phase, capped below 100.
    pub fn progress_percent(&self) -> f64 {
        self.budget.progress_percent(self.frames_rendered)
    }

    fn transition(&mut self, next: ExportStatus) -> AdmockResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(AdmockError::recording(format!(
                "Invalid recording transition {:?} -> {:?}",
                self.state, next
            )));
        }
        tracing::debug!(from = ?self.state, to = ?next, "Recording state changed");
        self.state = next;
        Ok(())
    }

    /// Pick a format, create the recorder over `stream`, and start it.
    ///
    /// On failure the stream is released and no recorder is kept.
    pub async fn start(
        &mut self,
        factory: &dyn RecorderFactory,
        stream: CaptureStream,
    ) -> AdmockResult<()> {
        if self.state != ExportStatus::Idle {
            return Err(AdmockError::recording("Recording session already started"));
        }

        let started = async {
            let mime = select_mime_type(factory)?;
            let mut recorder = factory.create(&stream, mime)?;
            recorder.start().await?;
            Ok::<_, AdmockError>((mime, recorder))
        }
        .await;

        match started {
            Ok((mime, recorder)) => {
                tracing::info!(
                    mime,
                    width = stream.width,
                    height = stream.height,
                    fps = stream.fps,
                    has_audio = stream.audio.is_some(),
                    estimated_frames = ?self.budget.estimated_total(),
                    "Recording started"
                );
                self.mime_type = Some(mime.to_string());
                self.recorder = Some(recorder);
                self.stream = Some(stream);
                self.transition(ExportStatus::Recording)
            }
            Err(e) => {
                stream.release();
                self.fail();
                Err(e)
            }
        }
    }

    /// Whether the loop must stop before painting another frame.
    pub fn check_stop(&self, ended: bool, paused: bool) -> Option<StopReason> {
        stop_reason(
            &self.budget,
            self.frames_rendered + self.ticks_skipped,
            self.abort.is_aborted(),
            ended,
            paused,
        )
    }

    /// Hand one composited frame to the recorder.
    pub async fn record_frame(&mut self, frame: &RgbaImage, video_time: f64) -> AdmockResult<()> {
        if self.stopped || self.state != ExportStatus::Recording {
            return Err(AdmockError::recording(format!(
                "Frame offered while {:?}",
                self.state
            )));
        }
        let recorder = self
            .recorder
            .as_mut()
            .ok_or_else(|| AdmockError::recording("No active recorder"))?;

        let timestamp = self.cadence.timestamp_of(self.frames_rendered);
        recorder.push_frame(frame, timestamp).await?;
        self.frames_rendered += 1;
        self.last_video_time = video_time;
        Ok(())
    }

    /// Stop the recorder and release the stream. Only the first call does
    /// anything.
    pub async fn stop(&mut self, reason: StopReason) -> AdmockResult<()> {
        if self.stopped {
            return Ok(());
        }
        self.stopped = true;

        let result = match self.recorder.take() {
            Some(mut recorder) => recorder.stop().await,
            None => Ok(Vec::new()),
        };
        if let Some(stream) = self.stream.take() {
            stream.release();
        }

        tracing::info!(
            ?reason,
            frames = self.frames_rendered,
            last_video_time = self.last_video_time,
            "Recording stopped"
        );

        match result {
            Ok(chunks) => {
                self.chunks = chunks;
                if self.state == ExportStatus::Recording {
                    self.transition(ExportStatus::Processing)?;
                }
                Ok(())
            }
            Err(e) => {
                self.fail();
                Err(e)
            }
        }
    }

    /// Join recorded chunks into one blob.
    /// Join the recorded chunks and finish the session. An empty recording
    /// moves the session to `error`.
    pub fn take_output(&mut self) -> AdmockResult<Vec<u8>> {
        let bytes: Vec<u8> = std::mem::take(&mut self.chunks).concat();
        if bytes.is_empty() {
            self.fail();
            return Err(AdmockError::EmptyRecording);
        }
        self.transition(ExportStatus::Completed)?;
        tracing::debug!(bytes = bytes.len(), "Recording joined");
        Ok(bytes)
    }

    /// Move to `error` unless already terminal.
    pub fn fail(&mut self) {
        if !self.state.is_terminal() {
            self.state = ExportStatus::Error;
        }
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        if let Some(stream) = self.stream.take() {
            if !self.stopped {
                tracing::warn!("Recording session dropped without stopping its recorder");
            }
            stream.release();
        }
    }
}
