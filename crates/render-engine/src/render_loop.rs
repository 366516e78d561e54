//! Fixed-cadence render loop.
//!
//! Each tick checks the stop conditions, then composes and records one
//! frame. Ticks that fall behind are delayed rather than bunched, so the
//! recorder never sees a burst of identical frames.

use admock_capture_engine::session::RecordingSession;
use admock_capture_engine::video::VideoElement;
use admock_common::clock::FrameCadence;
use admock_common::error::AdmockResult;
use admock_processing_core::frame_budget::StopReason;
use tokio::time::MissedTickBehavior;

use crate::compositor::FrameCompositor;

/// What the loop did before it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopOutcome {
    pub reason: StopReason,
    pub frames: u64,
    /// Ticks skipped because no frame was decodable.
    pub skipped: u64,
}

/// Drive `session` until the video ends, pauses, overruns its budget, or
/// the export is aborted. The recorder is stopped before this returns,
/// on success and on error.
///
/// `on_progress` receives the recording percentage every
/// `progress_every` frames.
pub async fn run_render_loop(
    video: &dyn VideoElement,
    compositor: &mut FrameCompositor,
    session: &mut RecordingSession,
    cadence: FrameCadence,
    progress_every: u64,
    on_progress: &(dyn Fn(f64) + Send + Sync),
) -> AdmockResult<LoopOutcome> {
    let progress_every = progress_every.max(1);
    let mut ticker = tokio::time::interval(cadence.interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        if let Some(reason) = session.check_stop(video.ended(), video.paused()) {
            session.stop(reason).await?;
            tracing::info!(
                ?reason,
                frames = session.frames_rendered(),
                skipped = session.ticks_skipped(),
                "Render loop finished"
            );
            return Ok(LoopOutcome {
                reason,
                frames: session.frames_rendered(),
                skipped: session.ticks_skipped(),
            });
        }

        let Some(frame) = video.current_frame() else {
            session.skip_tick();
            tracing::trace!(skipped = session.ticks_skipped(), "No decodable frame; skipping tick");
            continue;
        };

        let time = video.current_time();
        let composed = compositor.compose(&frame, time);
        if let Err(e) = session.record_frame(composed, time).await {
            tracing::error!(error = %e, "Recorder rejected a frame");
            if let Err(stop_err) = session.stop(StopReason::Failed).await {
                tracing::warn!(error = %stop_err, "Recorder also failed to stop");
            }
            return Err(e);
        }

        let frames = session.frames_rendered();
        if frames % progress_every == 0 {
            on_progress(session.progress_percent());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use admock_capture_engine::recorder::{RecorderFactory, MIME_CANDIDATES};
    use admock_capture_engine::session::AbortHandle;
    use admock_capture_engine::snapshot::OverlayBitmap;
    use admock_capture_engine::stages::OverlaySet;
    use admock_capture_engine::testing::{FakeRecorderFactory, FakeVideo};
    use admock_preview_model::geometry::{CanvasSize, DrawArea, FitMode};
    use admock_processing_core::frame_budget::FrameBudget;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    fn compositor() -> FrameCompositor {
        let size = CanvasSize::new(18, 32);
        let area = DrawArea {
            rect: size.full_rect(),
            fit: FitMode::Cover,
        };
        FrameCompositor::new(size, area, (1080, 1920), OverlaySet::Single(OverlayBitmap::blank(size)))
    }

    async fn started_session(
        factory: &FakeRecorderFactory,
        budget: FrameBudget,
        abort: AbortHandle,
    ) -> RecordingSession {
        let stream = factory.capture_stream(18, 32, 30, None).unwrap();
        let mut session = RecordingSession::new(FrameCadence::new(30), budget, abort);
        session.start(factory, stream).await.unwrap();
        session
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_until_ended_and_stops_once() {
        let video = FakeVideo::new(2.0, (1080, 1920));
        let factory = FakeRecorderFactory::supporting(&MIME_CANDIDATES);
        let mut session =
            started_session(&factory, FrameBudget::new(Some(60), 15), AbortHandle::new()).await;
        video.play().await.unwrap();

        let reports = Mutex::new(Vec::new());
        let outcome = run_render_loop(
            &video,
            &mut compositor(),
            &mut session,
            FrameCadence::new(30),
            10,
            &|p| reports.lock().unwrap().push(p),
        )
        .await
        .unwrap();

        assert_eq!(outcome.reason, StopReason::Ended);
        assert!((60..=62).contains(&outcome.frames), "frames = {}", outcome.frames);
        let log = factory.log();
        assert_eq!(log.stop_calls, 1);
        assert_eq!(log.frames, outcome.frames);
        assert_eq!(log.frames_after_stop, 0);

        let reports = reports.into_inner().unwrap();
        assert_eq!(reports.len() as u64, outcome.frames / 10);
        assert!(reports.windows(2).all(|w| w[0] <= w[1]));
        assert!(reports.iter().all(|p| *p <= 99.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_stops_endless_video() {
        let video = FakeVideo::new(f64::INFINITY, (1080, 1920));
        let factory = FakeRecorderFactory::supporting(&MIME_CANDIDATES);
        let mut session =
            started_session(&factory, FrameBudget::new(Some(30), 15), AbortHandle::new()).await;
        video.play().await.unwrap();

        let outcome = run_render_loop(
            &video,
            &mut compositor(),
            &mut session,
            FrameCadence::new(30),
            10,
            &|_| {},
        )
        .await
        .unwrap();

        assert_eq!(outcome.reason, StopReason::BudgetExceeded);
        assert_eq!(outcome.frames, 46);
    }

    #[tokio::test(start_paused = true)]
    async fn test_external_pause_stops_loop() {
        let video = Arc::new(FakeVideo::new(10.0, (1080, 1920)));
        let factory = FakeRecorderFactory::supporting(&MIME_CANDIDATES);
        let mut session =
            started_session(&factory, FrameBudget::new(Some(300), 15), AbortHandle::new()).await;
        video.play().await.unwrap();

        let pauser = Arc::clone(&video);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            pauser.pause();
        });

        let outcome = run_render_loop(
            video.as_ref(),
            &mut compositor(),
            &mut session,
            FrameCadence::new(30),
            10,
            &|_| {},
        )
        .await
        .unwrap();

        assert_eq!(outcome.reason, StopReason::Paused);
        assert!(outcome.frames < 30);
        assert_eq!(factory.log().stop_calls, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_undecodable_ticks_are_skipped() {
        let video = FakeVideo::new(1.0, (1080, 1920));
        video.set_decodable(false);
        let factory = FakeRecorderFactory::supporting(&MIME_CANDIDATES);
        let mut session =
            started_session(&factory, FrameBudget::new(Some(30), 15), AbortHandle::new()).await;
        video.play().await.unwrap();

        let outcome = run_render_loop(
            &video,
            &mut compositor(),
            &mut session,
            FrameCadence::new(30),
            10,
            &|_| {},
        )
        .await
        .unwrap();

        assert_eq!(outcome.reason, StopReason::Ended);
        assert_eq!(outcome.frames, 0);
        assert!(outcome.skipped >= 30);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_video_is_stopped_by_budget() {
        // Never ends, never pauses, never decodes.
        let video = FakeVideo::new(f64::INFINITY, (1080, 1920));
        video.set_decodable(false);
        let factory = FakeRecorderFactory::supporting(&MIME_CANDIDATES);
        let mut session =
            started_session(&factory, FrameBudget::new(Some(30), 15), AbortHandle::new()).await;
        video.play().await.unwrap();

        let outcome = tokio::time::timeout(
            Duration::from_secs(600),
            run_render_loop(
                &video,
                &mut compositor(),
                &mut session,
                FrameCadence::new(30),
                10,
                &|_| {},
            ),
        )
        .await
        .expect("render loop should stop on its own")
        .unwrap();

        assert_eq!(outcome.reason, StopReason::BudgetExceeded);
        assert_eq!(outcome.frames, 0);
        assert_eq!(outcome.skipped, 46);
        let log = factory.log();
        assert_eq!(log.stop_calls, 1);
        assert!(log.streams[0].is_released());
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_stops_recorder() {
        let video = FakeVideo::new(10.0, (1080, 1920));
        let factory = FakeRecorderFactory::supporting(&MIME_CANDIDATES);
        let abort = AbortHandle::new();
        let mut session =
            started_session(&factory, FrameBudget::new(Some(300), 15), abort.clone()).await;
        video.play().await.unwrap();

        let frames_seen = std::sync::atomic::AtomicU64::new(0);
        let outcome = run_render_loop(
            &video,
            &mut compositor(),
            &mut session,
            FrameCadence::new(30),
            10,
            &|_| {
                if frames_seen.fetch_add(10, std::sync::atomic::Ordering::SeqCst) >= 20 {
                    abort.abort();
                }
            },
        )
        .await
        .unwrap();

        assert_eq!(outcome.reason, StopReason::Aborted);
        assert_eq!(outcome.frames, 30);
        let log = factory.log();
        assert_eq!(log.stop_calls, 1);
        assert!(log.streams[0].is_released());
    }
}
