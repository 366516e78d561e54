//! The source video element and its playback flags.

use std::sync::Arc;
use std::time::Duration;

use admock_common::error::{AdmockError, AdmockResult};
use image::RgbaImage;

/// Media readiness, ordered the way browsers report it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReadyState {
    HaveNothing = 0,
    HaveMetadata = 1,
    HaveCurrentData = 2,
    HaveFutureData = 3,
    HaveEnoughData = 4,
}

impl ReadyState {
    /// Whether playback can start without stalling immediately.
    pub fn is_playable(self) -> bool {
        self >= ReadyState::HaveFutureData
    }

    /// Whether the current frame can be drawn.
    pub fn is_decodable(self) -> bool {
        self >= ReadyState::HaveCurrentData
    }
}

/// A decoded frame at the video's native resolution.
pub type VideoFrame = Arc<RgbaImage>;

/// Audio track attached to the element's media stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioTrack {
    pub id: String,
    pub label: String,
}

/// Host-implemented view of the preview's `<video>` element.
#[async_trait::async_trait]
pub trait VideoElement: Send + Sync {
    fn muted(&self) -> bool;
    fn set_muted(&self, muted: bool);

    fn looping(&self) -> bool;
    fn set_looping(&self, looping: bool);

    fn paused(&self) -> bool;
    fn ended(&self) -> bool;

    /// Playback position in seconds.
    fn current_time(&self) -> f64;
    fn seek(&self, seconds: f64);

    /// Duration in seconds. May be NaN or infinite for live sources.
    fn duration(&self) -> f64;

    /// Intrinsic `(width, height)`; `(0, 0)` before metadata loads.
    fn video_size(&self) -> (u32, u32);

    fn ready_state(&self) -> ReadyState;

    /// Start playback. Rejects when the host refuses autoplay.
    async fn play(&self) -> AdmockResult<()>;

    fn pause(&self);

    /// Frame at the current position, `None` when nothing is decodable.
    fn current_frame(&self) -> Option<VideoFrame>;

    /// Audio tracks available for capture.
    fn audio_tracks(&self) -> Vec<AudioTrack> {
        Vec::new()
    }
}

const READY_POLL: Duration = Duration::from_millis(20);

/// Wait until the video can play, or fail with a setup error after `timeout`.
pub async fn wait_until_playable(video: &dyn VideoElement, timeout: Duration) -> AdmockResult<()> {
    let poll = async {
        loop {
            if video.ready_state().is_playable() {
                return;
            }
            tokio::time::sleep(READY_POLL).await;
        }
    };

    tokio::time::timeout(timeout, poll).await.map_err(|_| {
        AdmockError::setup(format!(
            "Video was not ready to play within {} ms (state {:?})",
            timeout.as_millis(),
            video.ready_state()
        ))
    })
}

/// Loop/mute flags captured before an export takes over the video.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackState {
    pub muted: bool,
    pub looping: bool,
}

impl PlaybackState {
    pub fn capture(video: &dyn VideoElement) -> Self {
        Self {
            muted: video.muted(),
            looping: video.looping(),
        }
    }

    /// Put the flags back. A looping preview resumes playing, which it
    /// would have been doing before the export.
    pub async fn restore(&self, video: &dyn VideoElement) {
        video.set_muted(self.muted);
        video.set_looping(self.looping);
        if self.looping {
            if let Err(e) = video.play().await {
                tracing::warn!(error = %e, "Could not resume looping preview");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeVideo;

    #[test]
    fn test_ready_state_order() {
        assert!(ReadyState::HaveEnoughData.is_playable());
        assert!(ReadyState::HaveFutureData.is_playable());
        assert!(!ReadyState::HaveCurrentData.is_playable());
        assert!(ReadyState::HaveCurrentData.is_decodable());
        assert!(!ReadyState::HaveMetadata.is_decodable());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_playable_resolves() {
        let video = FakeVideo::new(10.0, (1080, 1920)).ready_after(Duration::from_millis(300));
        wait_until_playable(&video, Duration::from_secs(5)).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_until_playable_times_out() {
        let video = FakeVideo::new(10.0, (1080, 1920)).never_ready();
        let err = wait_until_playable(&video, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, AdmockError::Setup { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_playback_state_restore_resumes_looping() {
        let video = FakeVideo::new(10.0, (1080, 1920));
        video.set_looping(true);
        let saved = PlaybackState::capture(&video);

        video.set_muted(true);
        video.set_looping(false);
        video.pause();

        saved.restore(&video).await;
        assert!(!video.muted());
        assert!(video.looping());
        assert!(!video.paused());
    }

    #[tokio::test(start_paused = true)]
    async fn test_playback_state_restore_leaves_non_looping_paused() {
        let video = FakeVideo::new(10.0, (1080, 1920));
        let saved = PlaybackState::capture(&video);
        video.set_muted(true);

        saved.restore(&video).await;
        assert!(!video.muted());
        assert!(video.paused());
        assert_eq!(video.play_calls(), 0);
    }
}
