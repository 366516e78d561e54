//! Container transcoder: recorded WebM → MP4 (H.264/AAC).
//!
//! Encoders come in two API shapes. Newer modules expose async file
//! operations (`write_file`, `exec`, `read_file`, `delete_file`); older ones
//! expose a synchronous filesystem call plus a `run` that reports completion
//! through a callback. [`EncoderModule::into_engine`] probes which shape a
//! module has and wraps it once in the uniform [`EncoderEngine`].

use std::path::{Path, PathBuf};
use std::process::Stdio;

use admock_common::config::ExportSettings;
use admock_common::error::{AdmockError, AdmockResult};
use tokio::process::Command;
use tokio::sync::oneshot;

/// Name of the recorded input inside the encoder workspace.
pub const INPUT_NAME: &str = "input.webm";

/// Name of the transcoded output inside the encoder workspace.
pub const OUTPUT_NAME: &str = "output.mp4";

/// Encoder knobs. Defaults give the fixed command used for every export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscodeSettings {
    pub crf: u8,
    pub preset: String,
}

impl Default for TranscodeSettings {
    fn default() -> Self {
        Self {
            crf: 23,
            preset: "medium".to_string(),
        }
    }
}

impl From<&ExportSettings> for TranscodeSettings {
    fn from(settings: &ExportSettings) -> Self {
        Self {
            crf: settings.crf,
            preset: settings.preset.clone(),
        }
    }
}

/// Encoder arguments for one transcode.
pub fn transcode_args(input: &str, output: &str, settings: &TranscodeSettings) -> Vec<String> {
    vec![
        "-i".into(),
        input.into(),
        "-c:v".into(),
        "libx264".into(),
        "-preset".into(),
        settings.preset.clone(),
        "-crf".into(),
        settings.crf.to_string(),
        "-c:a".into(),
        "aac".into(),
        "-b:a".into(),
        "128k".into(),
        "-pix_fmt".into(),
        "yuv420p".into(),
        "-movflags".into(),
        "+faststart".into(),
        output.into(),
    ]
}

/// Uniform encoder surface used by [`transcode_to_container`].
#[async_trait::async_trait]
pub trait EncoderEngine: Send {
    async fn load(&mut self) -> AdmockResult<()>;
    async fn write_input(&mut self, name: &str, bytes: &[u8]) -> AdmockResult<()>;
    async fn run(&mut self, args: &[String]) -> AdmockResult<()>;
    async fn read_output(&mut self, name: &str) -> AdmockResult<Vec<u8>>;
    /// Best-effort removal of workspace files. Never fails.
    async fn cleanup(&mut self, names: &[&str]);
}

/// Encoder module with async file operations.
#[async_trait::async_trait]
pub trait FileApiEncoder: Send {
    async fn load(&mut self) -> AdmockResult<()>;
    async fn write_file(&mut self, name: &str, data: &[u8]) -> AdmockResult<()>;
    /// Run the encoder; returns its exit code.
    async fn exec(&mut self, args: &[String]) -> AdmockResult<i32>;
    async fn read_file(&mut self, name: &str) -> AdmockResult<Vec<u8>>;
    async fn delete_file(&mut self, name: &str) -> AdmockResult<()>;
}

/// Filesystem operation of a legacy encoder module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsOp<'a> {
    WriteFile(&'a str, &'a [u8]),
    ReadFile(&'a str),
    Unlink(&'a str),
}

/// Result of a legacy filesystem operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsResult {
    Done,
    Data(Vec<u8>),
}

/// Completion callback of a legacy run; receives the exit code.
pub type RunCallback = Box<dyn FnOnce(i32) + Send>;

/// Encoder module with a synchronous filesystem and a callback-style run.
#[async_trait::async_trait]
pub trait LegacyFsEncoder: Send {
    async fn load(&mut self) -> AdmockResult<()>;
    fn fs(&mut self, op: FsOp<'_>) -> AdmockResult<FsResult>;
    /// Start the encoder; `on_done` fires once it exits.
    fn run(&mut self, args: &[String], on_done: RunCallback) -> AdmockResult<()>;
}

/// A loaded encoder module, in whichever shape it was shipped.
pub enum EncoderModule {
    FileApi(Box<dyn FileApiEncoder>),
    LegacyFs(Box<dyn LegacyFsEncoder>),
}

impl EncoderModule {
    pub fn api_name(&self) -> &'static str {
        match self {
            EncoderModule::FileApi(_) => "file-api",
            EncoderModule::LegacyFs(_) => "legacy-fs",
        }
    }

    /// Wrap the module in the uniform engine interface.
    pub fn into_engine(self) -> Box<dyn EncoderEngine> {
        match self {
            EncoderModule::FileApi(inner) => Box::new(FileApiAdapter { inner }),
            EncoderModule::LegacyFs(inner) => Box::new(LegacyFsAdapter { inner }),
        }
    }
}

/// Produces the encoder module on demand, so nothing is loaded until an
/// export actually needs it.
#[async_trait::async_trait]
pub trait EncoderLoader: Send + Sync {
    async fn load_module(&self) -> AdmockResult<EncoderModule>;
}

fn exit_status(code: i32) -> AdmockResult<()> {
    if code == 0 {
        Ok(())
    } else {
        Err(AdmockError::transcode(format!("Encoder exited with code {code}")))
    }
}

struct FileApiAdapter {
    inner: Box<dyn FileApiEncoder>,
}

#[async_trait::async_trait]
impl EncoderEngine for FileApiAdapter {
    async fn load(&mut self) -> AdmockResult<()> {
        self.inner.load().await
    }

    async fn write_input(&mut self, name: &str, bytes: &[u8]) -> AdmockResult<()> {
        self.inner.write_file(name, bytes).await
    }

    async fn run(&mut self, args: &[String]) -> AdmockResult<()> {
        exit_status(self.inner.exec(args).await?)
    }

    async fn read_output(&mut self, name: &str) -> AdmockResult<Vec<u8>> {
        self.inner.read_file(name).await
    }

    async fn cleanup(&mut self, names: &[&str]) {
        for name in names {
            if let Err(e) = self.inner.delete_file(name).await {
                tracing::debug!(name, error = %e, "Encoder cleanup skipped file");
            }
        }
    }
}

struct LegacyFsAdapter {
    inner: Box<dyn LegacyFsEncoder>,
}

#[async_trait::async_trait]
impl EncoderEngine for LegacyFsAdapter {
    async fn load(&mut self) -> AdmockResult<()> {
        self.inner.load().await
    }

    async fn write_input(&mut self, name: &str, bytes: &[u8]) -> AdmockResult<()> {
        self.inner.fs(FsOp::WriteFile(name, bytes)).map(|_| ())
    }

    async fn run(&mut self, args: &[String]) -> AdmockResult<()> {
        let (tx, rx) = oneshot::channel();
        self.inner.run(
            args,
            Box::new(move |code| {
                let _ = tx.send(code);
            }),
        )?;
        let code = rx
            .await
            .map_err(|_| AdmockError::transcode("Encoder finished without reporting an exit code"))?;
        exit_status(code)
    }

    async fn read_output(&mut self, name: &str) -> AdmockResult<Vec<u8>> {
        match self.inner.fs(FsOp::ReadFile(name))? {
            FsResult::Data(bytes) => Ok(bytes),
            FsResult::Done => Err(AdmockError::transcode(format!(
                "Encoder returned no data for {name}"
            ))),
        }
    }

    async fn cleanup(&mut self, names: &[&str]) {
        for name in names {
            if let Err(e) = self.inner.fs(FsOp::Unlink(name)) {
                tracing::debug!(name, error = %e, "Encoder cleanup skipped file");
            }
        }
    }
}

fn as_transcode_error(err: AdmockError) -> AdmockError {
    match err {
        AdmockError::Transcode { .. } => err,
        other => AdmockError::transcode(other.to_string()),
    }
}

/// Convert a recorded container into MP4.
///
/// The encoder is loaded here, not earlier. Workspace files are removed
/// whether or not the conversion succeeds. Every failure surfaces as
/// [`AdmockError::Transcode`]; the raw recording is never returned instead.
pub async fn transcode_to_container(
    loader: &dyn EncoderLoader,
    source: &[u8],
    settings: &TranscodeSettings,
) -> AdmockResult<Vec<u8>> {
    let module = loader.load_module().await.map_err(as_transcode_error)?;
    tracing::info!(api = module.api_name(), input_bytes = source.len(), "Transcoding recording");
    let mut engine = module.into_engine();

    let args = transcode_args(INPUT_NAME, OUTPUT_NAME, settings);
    let result = async {
        engine.load().await?;
        engine.write_input(INPUT_NAME, source).await?;
        engine.run(&args).await?;
        engine.read_output(OUTPUT_NAME).await
    }
    .await;
    engine.cleanup(&[INPUT_NAME, OUTPUT_NAME]).await;

    let output = result.map_err(as_transcode_error)?;
    if output.is_empty() {
        return Err(AdmockError::transcode("Encoder produced an empty file"));
    }
    tracing::info!(output_bytes = output.len(), "Transcode finished");
    Ok(output)
}

/// File-API encoder backed by the `ffmpeg` executable and a temp directory.
pub struct FfmpegProcessEncoder {
    binary: String,
    workspace: Option<tempfile::TempDir>,
}

impl FfmpegProcessEncoder {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            workspace: None,
        }
    }

    fn workspace_dir(&self) -> AdmockResult<&Path> {
        self.workspace
            .as_ref()
            .map(|dir| dir.path())
            .ok_or_else(|| AdmockError::transcode("Encoder workspace is not loaded"))
    }

    fn path_of(&self, name: &str) -> AdmockResult<PathBuf> {
        let dir = self.workspace_dir()?;
        let plain = Path::new(name)
            .file_name()
            .is_some_and(|file| file == name);
        if !plain {
            return Err(AdmockError::transcode(format!(
                "Refusing workspace path outside the encoder directory: {name}"
            )));
        }
        Ok(dir.join(name))
    }
}

#[async_trait::async_trait]
impl FileApiEncoder for FfmpegProcessEncoder {
    async fn load(&mut self) -> AdmockResult<()> {
        if self.workspace.is_some() {
            return Ok(());
        }
        if !admock_capture_engine::ffmpeg::command_exists(&self.binary) {
            return Err(AdmockError::unsupported(format!(
                "{} not found in PATH",
                self.binary
            )));
        }
        let dir = tempfile::Builder::new()
            .prefix("admock-transcode-")
            .tempdir()?;
        tracing::debug!(workspace = %dir.path().display(), "Encoder workspace created");
        self.workspace = Some(dir);
        Ok(())
    }

    async fn write_file(&mut self, name: &str, data: &[u8]) -> AdmockResult<()> {
        let path = self.path_of(name)?;
        tokio::fs::write(&path, data).await?;
        Ok(())
    }

    async fn exec(&mut self, args: &[String]) -> AdmockResult<i32> {
        let cwd = self.workspace_dir()?.to_path_buf();
        tracing::debug!(?args, "Running ffmpeg transcode");

        let output = Command::new(&self.binary)
            .args(["-hide_banner", "-loglevel", "error", "-y"])
            .args(args)
            .current_dir(&cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| AdmockError::transcode(format!("Failed to start ffmpeg: {e}")))?;

        if !output.status.success() {
            tracing::warn!(
                status = %output.status,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "ffmpeg transcode failed"
            );
        }
        Ok(output.status.code().unwrap_or(-1))
    }

    async fn read_file(&mut self, name: &str) -> AdmockResult<Vec<u8>> {
        let path = self.path_of(name)?;
        Ok(tokio::fs::read(&path).await?)
    }

    async fn delete_file(&mut self, name: &str) -> AdmockResult<()> {
        let path = self.path_of(name)?;
        tokio::fs::remove_file(&path).await?;
        Ok(())
    }
}

/// Loads [`FfmpegProcessEncoder`] modules.
#[derive(Debug, Clone)]
pub struct FfmpegEncoderLoader {
    binary: String,
}

impl FfmpegEncoderLoader {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Use the configured `ffmpeg_binary`.
    pub fn from_settings(settings: &ExportSettings) -> Self {
        Self::new(settings.ffmpeg_binary.clone())
    }
}

#[async_trait::async_trait]
impl EncoderLoader for FfmpegEncoderLoader {
    async fn load_module(&self) -> AdmockResult<EncoderModule> {
        Ok(EncoderModule::FileApi(Box::new(FfmpegProcessEncoder::new(
            self.binary.clone(),
        ))))
    }
}
