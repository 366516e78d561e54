//! Native recorder backend: raw RGBA frames piped through `ffmpeg`.
//!
//! Frames go to ffmpeg's stdin as `rawvideo`/`rgba` at the stream rate; the
//! encoded container comes back on stdout and is collected into chunks by a
//! background task.

use std::process::Stdio;
use std::time::Duration;

use admock_common::config::ExportSettings;
use admock_common::error::{AdmockError, AdmockResult};
use image::RgbaImage;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::task::JoinHandle;

use crate::recorder::{CaptureStream, MediaRecorder, RecorderFactory};

const READ_CHUNK: usize = 64 * 1024;

/// Encoder and muxer for a recorder MIME type, if the pipe backend can
/// produce it.
pub fn codec_for_mime(mime: &str) -> Option<(&'static str, &'static str)> {
    match mime {
        "video/webm;codecs=vp9,opus" => Some(("libvpx-vp9", "webm")),
        "video/webm;codecs=vp8,opus" | "video/webm" => Some(("libvpx", "webm")),
        "video/x-matroska" => Some(("libx264", "matroska")),
        _ => None,
    }
}

/// Arguments for one pipe recording.
pub fn pipe_args(stream: &CaptureStream, codec: &str, format: &str) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-f".into(),
        "rawvideo".into(),
        "-pix_fmt".into(),
        "rgba".into(),
        "-s".into(),
        format!("{}x{}", stream.width, stream.height),
        "-r".into(),
        stream.fps.to_string(),
        "-i".into(),
        "pipe:0".into(),
        "-an".into(),
        "-c:v".into(),
        codec.into(),
    ];
    if codec.starts_with("libvpx") {
        args.extend(["-deadline".into(), "realtime".into(), "-b:v".into(), "4M".into()]);
    }
    args.extend([
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-f".into(),
        format.into(),
        "pipe:1".into(),
    ]);
    args
}

/// Whether `binary` resolves on `PATH`.
pub fn command_exists(binary: &str) -> bool {
    std::process::Command::new("sh")
        .arg("-c")
        .arg(format!("command -v {binary} >/dev/null 2>&1"))
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Creates [`FfmpegPipeRecorder`]s.
#[derive(Debug, Clone)]
pub struct FfmpegRecorderFactory {
    binary: String,
    available: bool,
}

impl FfmpegRecorderFactory {
    /// Probe `PATH` for `binary` once.
    pub fn new(binary: impl Into<String>) -> Self {
        let binary = binary.into();
        let available = command_exists(&binary);
        if !available {
            tracing::warn!(%binary, "ffmpeg not found; native recording unavailable");
        }
        Self { binary, available }
    }

    /// Use the configured `ffmpeg_binary`.
    pub fn from_settings(settings: &ExportSettings) -> Self {
        Self::new(settings.ffmpeg_binary.clone())
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    pub fn is_available(&self) -> bool {
        self.available
    }
}

impl RecorderFactory for FfmpegRecorderFactory {
    fn is_type_supported(&self, mime: &str) -> bool {
        self.available && codec_for_mime(mime).is_some()
    }

    fn create(&self, stream: &CaptureStream, mime: &str) -> AdmockResult<Box<dyn MediaRecorder>> {
        let (codec, format) = codec_for_mime(mime)
            .ok_or_else(|| AdmockError::unsupported(format!("Cannot record {mime} with ffmpeg")))?;
        if let Some(audio) = &stream.audio {
            tracing::info!(track = %audio.label, "Audio is not forwarded by the ffmpeg recorder");
        }
        Ok(Box::new(FfmpegPipeRecorder {
            binary: self.binary.clone(),
            mime: mime.to_string(),
            args: pipe_args(stream, codec, format),
            width: stream.width,
            height: stream.height,
            child: None,
            stdin: None,
            stdout_task: None,
            stderr_task: None,
        }))
    }
}

/// A running `ffmpeg` child fed through stdin.
pub struct FfmpegPipeRecorder {
    binary: String,
    mime: String,
    args: Vec<String>,
    width: u32,
    height: u32,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stdout_task: Option<JoinHandle<std::io::Result<Vec<Vec<u8>>>>>,
    stderr_task: Option<JoinHandle<String>>,
}

#[async_trait::async_trait]
impl MediaRecorder for FfmpegPipeRecorder {
    fn mime_type(&self) -> &str {
        &self.mime
    }

    async fn start(&mut self) -> AdmockResult<()> {
        tracing::debug!(args = ?self.args, "Starting ffmpeg recorder");
        let mut child = Command::new(&self.binary)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AdmockError::recording(format!("Failed to start ffmpeg: {e}")))?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| AdmockError::recording("Failed to capture ffmpeg stdout"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| AdmockError::recording("Failed to capture ffmpeg stderr"))?;
        self.stdin = child.stdin.take();

        self.stdout_task = Some(tokio::spawn(async move {
            let mut chunks = Vec::new();
            let mut buf = vec![0u8; READ_CHUNK];
            loop {
                let n = stdout.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                chunks.push(buf[..n].to_vec());
            }
            Ok(chunks)
        }));
        self.stderr_task = Some(tokio::spawn(async move {
            let mut text = String::new();
            let _ = stderr.read_to_string(&mut text).await;
            text
        }));

        tracing::info!(pid = child.id(), mime = %self.mime, "ffmpeg recorder started");
        self.child = Some(child);
        Ok(())
    }

    async fn push_frame(&mut self, frame: &RgbaImage, _timestamp: Duration) -> AdmockResult<()> {
        if frame.width() != self.width || frame.height() != self.height {
            return Err(AdmockError::recording(format!(
                "Frame is {}x{}, stream is {}x{}",
                frame.width(),
                frame.height(),
                self.width,
                self.height
            )));
        }
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| AdmockError::recording("ffmpeg recorder is not running"))?;
        stdin
            .write_all(frame.as_raw())
            .await
            .map_err(|e| AdmockError::recording(format!("Failed to write frame to ffmpeg: {e}")))
    }

    async fn stop(&mut self) -> AdmockResult<Vec<Vec<u8>>> {
        // Closing stdin is ffmpeg's end-of-stream.
        if let Some(mut stdin) = self.stdin.take() {
            let _ = stdin.shutdown().await;
        }
        let mut child = self
            .child
            .take()
            .ok_or_else(|| AdmockError::recording("ffmpeg recorder was never started"))?;
        let status = child
            .wait()
            .await
            .map_err(|e| AdmockError::recording(format!("Failed waiting for ffmpeg: {e}")))?;

        let chunks = match self.stdout_task.take() {
            Some(task) => task
                .await
                .map_err(|e| AdmockError::recording(format!("ffmpeg reader task failed: {e}")))?
                .map_err(|e| AdmockError::recording(format!("Failed reading ffmpeg output: {e}")))?,
            None => Vec::new(),
        };
        let stderr = match self.stderr_task.take() {
            Some(task) => task.await.unwrap_or_default(),
            None => String::new(),
        };

        if !status.success() {
            return Err(AdmockError::recording(format!(
                "ffmpeg exited with {status}: {}",
                stderr.trim()
            )));
        }
        tracing::info!(
            chunks = chunks.len(),
            bytes = chunks.iter().map(Vec::len).sum::<usize>(),
            "ffmpeg recorder finished"
        );
        Ok(chunks)
    }
}
