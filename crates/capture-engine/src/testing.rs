//! In-memory collaborators for tests.
//!
//! Enabled for this crate's unit tests and, through the `test-support`
//! feature, for downstream integration tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use admock_common::error::{AdmockError, AdmockResult};
use admock_preview_model::geometry::ElementBounds;
use admock_processing_core::stages::CtaStage;
use image::{Rgba, RgbaImage};
use tokio::time::Instant;

use crate::dom::{ElementId, PreviewDocument, RasterizeOptions, VideoHandle, HIDE_BACKGROUND_ATTR};
use crate::recorder::{CaptureStream, MediaRecorder, RecorderFactory};
use crate::stages::StageController;
use crate::video::{AudioTrack, ReadyState, VideoElement, VideoFrame};

/// Device-pixel rows of opaque chrome at the top of every fake raster.
pub const CHROME_ROWS: u32 = 8;

/// Color of every pixel in a [`FakeVideo`] frame.
pub const VIDEO_PIXEL: [u8; 4] = [0, 200, 0, 255];

/// Chrome color the fake document paints for a CTA stage.
pub fn stage_marker(stage: Option<CtaStage>) -> [u8; 4] {
    match stage {
        None => [200, 200, 200, 255],
        Some(stage) => [40 + 60 * stage.index() as u8, 0, 0, 255],
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn parse_rgb(css: &str) -> Option<[u8; 3]> {
    let inner = css.trim().strip_prefix("rgb(")?.strip_suffix(')')?;
    let mut parts = inner.split(',').map(|p| p.trim().parse::<u8>());
    let rgb = [parts.next()?.ok()?, parts.next()?.ok()?, parts.next()?.ok()?];
    parts.next().is_none().then_some(rgb)
}

type StyleMap = HashMap<(ElementId, String), String>;

/// Preview document with a root, a key-flagged video wrapper, a video and
/// one scrollable panel.
///
/// Rasters paint [`CHROME_ROWS`] rows in the current stage's marker color,
/// then fill the rest with the wrapper's inline background (if it is an
/// `rgb()` value) or the requested background.
pub struct FakeDocument {
    css_size: (f64, f64),
    video: Option<VideoHandle>,
    video_bounds: Option<ElementBounds>,
    styles: Mutex<StyleMap>,
    scrolls: Mutex<HashMap<ElementId, (f64, f64)>>,
    stage: Mutex<Option<CtaStage>>,
    stage_calls: Mutex<Vec<CtaStage>>,
    raster_log: Mutex<Vec<RasterizeOptions>>,
    styles_at_raster: Mutex<Vec<StyleMap>>,
    scrolls_at_raster: Mutex<Vec<HashMap<ElementId, (f64, f64)>>>,
    raster_calls: AtomicUsize,
    fail_all: AtomicBool,
    fail_calls: Mutex<HashSet<usize>>,
    size_skew: AtomicUsize,
}

impl FakeDocument {
    pub const ROOT: ElementId = ElementId(1);
    pub const WRAPPER: ElementId = ElementId(2);
    pub const VIDEO: ElementId = ElementId(3);
    pub const SCROLLER: ElementId = ElementId(4);

    pub fn new(css_width: f64, css_height: f64) -> Self {
        Self {
            css_size: (css_width, css_height),
            video: None,
            video_bounds: None,
            styles: Mutex::new(HashMap::new()),
            scrolls: Mutex::new(HashMap::new()),
            stage: Mutex::new(None),
            stage_calls: Mutex::new(Vec::new()),
            raster_log: Mutex::new(Vec::new()),
            styles_at_raster: Mutex::new(Vec::new()),
            scrolls_at_raster: Mutex::new(Vec::new()),
            raster_calls: AtomicUsize::new(0),
            fail_all: AtomicBool::new(false),
            fail_calls: Mutex::new(HashSet::new()),
            size_skew: AtomicUsize::new(0),
        }
    }

    pub fn with_video(mut self, video: Arc<FakeVideo>) -> Self {
        self.video = Some(VideoHandle {
            element: Self::VIDEO,
            media: video,
        });
        self
    }

    /// Bounding box of the video element, in CSS pixels.
    pub fn with_video_bounds(mut self, bounds: ElementBounds) -> Self {
        self.video_bounds = Some(bounds);
        self
    }

    pub fn fail_rasterization(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    /// Fail the `n`th rasterization (1-based).
    pub fn fail_raster_call(&self, n: usize) {
        lock(&self.fail_calls).insert(n);
    }

    /// Make rasters `extra` device pixels larger than requested.
    pub fn skew_raster_size(&self, extra: usize) {
        self.size_skew.store(extra, Ordering::SeqCst);
    }

    pub fn raster_calls(&self) -> usize {
        self.raster_calls.load(Ordering::SeqCst)
    }

    pub fn last_raster_options(&self) -> Option<RasterizeOptions> {
        lock(&self.raster_log).last().cloned()
    }

    pub fn style_map(&self) -> StyleMap {
        lock(&self.styles).clone()
    }

    pub fn styles_at_raster(&self) -> Vec<StyleMap> {
        lock(&self.styles_at_raster).clone()
    }

    pub fn scroll_at_raster(&self, element: ElementId) -> Option<(f64, f64)> {
        lock(&self.scrolls_at_raster)
            .last()
            .map(|scrolls| scrolls.get(&element).copied().unwrap_or((0.0, 0.0)))
    }

    pub fn stage_calls(&self) -> Vec<CtaStage> {
        lock(&self.stage_calls).clone()
    }

    pub fn current_stage(&self) -> Option<CtaStage> {
        *lock(&self.stage)
    }

    fn paint(&self, options: &RasterizeOptions, width: u32, height: u32) -> RgbaImage {
        let chrome = Rgba(stage_marker(self.current_stage()));
        let wrapper = lock(&self.styles)
            .get(&(Self::WRAPPER, "background".to_string()))
            .and_then(|css| parse_rgb(css))
            .map(|[r, g, b]| Rgba([r, g, b, 255]));
        let fill = wrapper
            .or(options.background)
            .unwrap_or(Rgba([0, 0, 0, 0]));

        RgbaImage::from_fn(width, height, |_, y| if y < CHROME_ROWS { chrome } else { fill })
    }
}

#[async_trait::async_trait]
impl PreviewDocument for FakeDocument {
    fn root(&self) -> ElementId {
        Self::ROOT
    }

    fn find_video(&self) -> Option<VideoHandle> {
        self.video.clone()
    }

    fn elements_with_attribute(&self, name: &str) -> Vec<ElementId> {
        if name == HIDE_BACKGROUND_ATTR {
            vec![Self::WRAPPER]
        } else {
            Vec::new()
        }
    }

    fn scrollable_descendants(&self) -> Vec<ElementId> {
        vec![Self::SCROLLER]
    }

    fn style_property(&self, element: ElementId, property: &str) -> Option<String> {
        lock(&self.styles)
            .get(&(element, property.to_string()))
            .cloned()
    }

    fn set_style_property(&self, element: ElementId, property: &str, value: Option<&str>) {
        let mut styles = lock(&self.styles);
        match value {
            Some(value) => {
                styles.insert((element, property.to_string()), value.to_string());
            }
            None => {
                styles.remove(&(element, property.to_string()));
            }
        }
    }

    fn scroll_offset(&self, element: ElementId) -> (f64, f64) {
        lock(&self.scrolls)
            .get(&element)
            .copied()
            .unwrap_or((0.0, 0.0))
    }

    fn set_scroll_offset(&self, element: ElementId, offset: (f64, f64)) {
        lock(&self.scrolls).insert(element, offset);
    }

    fn bounding_box(&self, element: ElementId) -> Option<ElementBounds> {
        match element {
            Self::ROOT => Some(ElementBounds::new(0.0, 0.0, self.css_size.0, self.css_size.1)),
            Self::VIDEO if self.video.is_some() => Some(self.video_bounds.unwrap_or(
                ElementBounds::new(0.0, 0.0, self.css_size.0, self.css_size.1),
            )),
            _ => None,
        }
    }

    async fn rasterize(&self, options: &RasterizeOptions) -> AdmockResult<RgbaImage> {
        let call = self.raster_calls.fetch_add(1, Ordering::SeqCst) + 1;
        lock(&self.raster_log).push(options.clone());
        lock(&self.styles_at_raster).push(self.style_map());
        let scrolls = lock(&self.scrolls).clone();
        lock(&self.scrolls_at_raster).push(scrolls);

        if self.fail_all.load(Ordering::SeqCst) || lock(&self.fail_calls).contains(&call) {
            return Err(AdmockError::capture(format!("fake raster {call} failed")));
        }

        let skew = self.size_skew.load(Ordering::SeqCst) as u32;
        let width = (options.css_width * options.scale as f64).round() as u32 + skew;
        let height = (options.css_height * options.scale as f64).round() as u32 + skew;
        Ok(self.paint(options, width, height))
    }
}

#[async_trait::async_trait]
impl StageController for FakeDocument {
    async fn set_animation_stage(&self, stage: CtaStage) {
        *lock(&self.stage) = Some(stage);
        lock(&self.stage_calls).push(stage);
    }
}

#[derive(Debug, Clone, Copy)]
enum Readiness {
    Ready,
    After(Duration),
    Never,
}

struct VideoState {
    muted: bool,
    looping: bool,
    playing_since: Option<Instant>,
    base_time: f64,
    play_calls: usize,
    seeks: Vec<f64>,
}

impl VideoState {
    fn time(&self, duration: f64) -> f64 {
        let Some(since) = self.playing_since else {
            return self.base_time;
        };
        let t = self.base_time + since.elapsed().as_secs_f64();
        if !duration.is_finite() {
            t
        } else if self.looping && duration > 0.0 {
            t % duration
        } else {
            t.min(duration)
        }
    }

    fn ended(&self, duration: f64) -> bool {
        !self.looping && duration.is_finite() && self.time(duration) >= duration
    }
}

/// Video that plays on tokio's clock, so paused-time tests are exact.
pub struct FakeVideo {
    duration: f64,
    size: (u32, u32),
    frame: VideoFrame,
    created: Instant,
    readiness: Readiness,
    reject_play: bool,
    decodable: AtomicBool,
    audio: Vec<AudioTrack>,
    state: Mutex<VideoState>,
}

impl FakeVideo {
    pub fn new(duration: f64, size: (u32, u32)) -> Self {
        Self {
            duration,
            size,
            frame: Arc::new(RgbaImage::from_pixel(8, 8, Rgba(VIDEO_PIXEL))),
            created: Instant::now(),
            readiness: Readiness::Ready,
            reject_play: false,
            decodable: AtomicBool::new(true),
            audio: Vec::new(),
            state: Mutex::new(VideoState {
                muted: false,
                looping: false,
                playing_since: None,
                base_time: 0.0,
                play_calls: 0,
                seeks: Vec::new(),
            }),
        }
    }

    pub fn ready_after(mut self, delay: Duration) -> Self {
        self.readiness = Readiness::After(delay);
        self
    }

    pub fn never_ready(mut self) -> Self {
        self.readiness = Readiness::Never;
        self
    }

    pub fn rejecting_play(mut self) -> Self {
        self.reject_play = true;
        self
    }

    pub fn with_audio(mut self, track: AudioTrack) -> Self {
        self.audio.push(track);
        self
    }

    pub fn set_decodable(&self, decodable: bool) {
        self.decodable.store(decodable, Ordering::SeqCst);
    }

    pub fn play_calls(&self) -> usize {
        lock(&self.state).play_calls
    }

    pub fn seeks(&self) -> Vec<f64> {
        lock(&self.state).seeks.clone()
    }
}

#[async_trait::async_trait]
impl VideoElement for FakeVideo {
    fn muted(&self) -> bool {
        lock(&self.state).muted
    }

    fn set_muted(&self, muted: bool) {
        lock(&self.state).muted = muted;
    }

    fn looping(&self) -> bool {
        lock(&self.state).looping
    }

    fn set_looping(&self, looping: bool) {
        let mut state = lock(&self.state);
        state.base_time = state.time(self.duration);
        if state.playing_since.is_some() {
            state.playing_since = Some(Instant::now());
        }
        state.looping = looping;
    }

    fn paused(&self) -> bool {
        let state = lock(&self.state);
        state.playing_since.is_none() || state.ended(self.duration)
    }

    fn ended(&self) -> bool {
        lock(&self.state).ended(self.duration)
    }

    fn current_time(&self) -> f64 {
        lock(&self.state).time(self.duration)
    }

    fn seek(&self, seconds: f64) {
        let mut state = lock(&self.state);
        state.base_time = seconds.max(0.0);
        state.seeks.push(seconds);
        if state.playing_since.is_some() {
            state.playing_since = Some(Instant::now());
        }
    }

    fn duration(&self) -> f64 {
        self.duration
    }

    fn video_size(&self) -> (u32, u32) {
        self.size
    }

    fn ready_state(&self) -> ReadyState {
        match self.readiness {
            Readiness::Ready => ReadyState::HaveEnoughData,
            Readiness::After(delay) if self.created.elapsed() >= delay => {
                ReadyState::HaveEnoughData
            }
            _ => ReadyState::HaveMetadata,
        }
    }

    async fn play(&self) -> AdmockResult<()> {
        let mut state = lock(&self.state);
        state.play_calls += 1;
        if self.reject_play {
            return Err(AdmockError::playback("play() was rejected"));
        }
        if state.ended(self.duration) {
            state.base_time = 0.0;
            state.playing_since = None;
        }
        if state.playing_since.is_none() {
            state.playing_since = Some(Instant::now());
        }
        Ok(())
    }

    fn pause(&self) {
        let mut state = lock(&self.state);
        state.base_time = state.time(self.duration);
        state.playing_since = None;
    }

    fn current_frame(&self) -> Option<VideoFrame> {
        let decodable =
            self.decodable.load(Ordering::SeqCst) && self.ready_state().is_decodable();
        decodable.then(|| self.frame.clone())
    }

    fn audio_tracks(&self) -> Vec<AudioTrack> {
        self.audio.clone()
    }
}

/// Everything the fake recorders observed.
#[derive(Debug, Clone, Default)]
pub struct RecorderLog {
    pub streams: Vec<CaptureStream>,
    pub recorders_created: usize,
    pub mime: Option<String>,
    pub started: bool,
    pub frames: u64,
    pub frames_after_stop: u64,
    pub stop_calls: usize,
    pub last_timestamp: Option<Duration>,
    /// Every `sample_every`th frame, by index.
    pub samples: Vec<(u64, RgbaImage)>,
}

/// Recorder factory that keeps frames in memory.
#[derive(Clone)]
pub struct FakeRecorderFactory {
    supported: Vec<String>,
    output: Vec<Vec<u8>>,
    fail_start: bool,
    sample_every: u64,
    log: Arc<Mutex<RecorderLog>>,
}

impl FakeRecorderFactory {
    pub fn supporting(mimes: &[&str]) -> Self {
        Self {
            supported: mimes.iter().map(|m| m.to_string()).collect(),
            output: vec![b"webm-header".to_vec(), b"webm-clusters".to_vec()],
            fail_start: false,
            sample_every: 30,
            log: Arc::new(Mutex::new(RecorderLog::default())),
        }
    }

    /// Chunks returned from `stop()`.
    pub fn with_output(mut self, chunks: Vec<Vec<u8>>) -> Self {
        self.output = chunks;
        self
    }

    pub fn failing_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    pub fn sample_every(mut self, frames: u64) -> Self {
        self.sample_every = frames.max(1);
        self
    }

    pub fn log(&self) -> RecorderLog {
        lock(&self.log).clone()
    }
}

impl RecorderFactory for FakeRecorderFactory {
    fn is_type_supported(&self, mime: &str) -> bool {
        self.supported.iter().any(|m| m == mime)
    }

    fn create(&self, _stream: &CaptureStream, mime: &str) -> AdmockResult<Box<dyn MediaRecorder>> {
        let mut log = lock(&self.log);
        log.recorders_created += 1;
        log.mime = Some(mime.to_string());
        Ok(Box::new(FakeRecorder {
            mime: mime.to_string(),
            output: self.output.clone(),
            fail_start: self.fail_start,
            sample_every: self.sample_every,
            stopped: false,
            log: Arc::clone(&self.log),
        }))
    }

    fn capture_stream(
        &self,
        width: u32,
        height: u32,
        fps: u32,
        audio: Option<AudioTrack>,
    ) -> AdmockResult<CaptureStream> {
        let stream = CaptureStream::new(width, height, fps, audio);
        lock(&self.log).streams.push(stream.clone());
        Ok(stream)
    }
}

struct FakeRecorder {
    mime: String,
    output: Vec<Vec<u8>>,
    fail_start: bool,
    sample_every: u64,
    stopped: bool,
    log: Arc<Mutex<RecorderLog>>,
}

#[async_trait::async_trait]
impl MediaRecorder for FakeRecorder {
    fn mime_type(&self) -> &str {
        &self.mime
    }

    async fn start(&mut self) -> AdmockResult<()> {
        if self.fail_start {
            return Err(AdmockError::recording("fake recorder refused to start"));
        }
        lock(&self.log).started = true;
        Ok(())
    }

    async fn push_frame(&mut self, frame: &RgbaImage, timestamp: Duration) -> AdmockResult<()> {
        let mut log = lock(&self.log);
        if self.stopped {
            log.frames_after_stop += 1;
            return Ok(());
        }
        if log.frames % self.sample_every == 0 {
            let index = log.frames;
            log.samples.push((index, frame.clone()));
        }
        log.frames += 1;
        log.last_timestamp = Some(timestamp);
        Ok(())
    }

    async fn stop(&mut self) -> AdmockResult<Vec<Vec<u8>>> {
        self.stopped = true;
        lock(&self.log).stop_calls += 1;
        Ok(self.output.clone())
    }
}
