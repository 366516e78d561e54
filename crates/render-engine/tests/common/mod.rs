//! Fake encoder modules shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use admock_common::error::{AdmockError, AdmockResult};
use admock_preview_model::status::ExportProgress;
use admock_render_engine::transcode::{
    EncoderLoader, EncoderModule, FileApiEncoder, FsOp, FsResult, LegacyFsEncoder, RunCallback,
    OUTPUT_NAME,
};
use admock_render_engine::ProgressCallback;

pub type CallLog = Arc<Mutex<Vec<String>>>;

/// Which API shape the fake module exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    FileApi,
    LegacyFs,
}

/// Failure injection for fake encoders.
#[derive(Debug, Clone, Copy, Default)]
pub struct Faults {
    pub fail_module: bool,
    pub fail_load: bool,
    pub nonzero_exit: bool,
    pub drop_callback: bool,
}

/// Output the fakes "encode": the input prefixed with `mp4:`.
pub fn encoded(input: &[u8]) -> Vec<u8> {
    [b"mp4:".as_slice(), input].concat()
}

struct Workspace {
    log: CallLog,
    faults: Faults,
    files: HashMap<String, Vec<u8>>,
}

impl Workspace {
    fn record(&self, line: String) {
        self.log.lock().unwrap().push(line);
    }

    fn load(&self) -> AdmockResult<()> {
        self.record("load".into());
        if self.faults.fail_load {
            return Err(AdmockError::setup("encoder core failed to load"));
        }
        Ok(())
    }

    fn write(&mut self, name: &str, data: &[u8]) {
        self.record(format!("write {name} ({} bytes)", data.len()));
        self.files.insert(name.to_string(), data.to_vec());
    }

    /// Run and return the exit code.
    fn run(&mut self, args: &[String]) -> i32 {
        self.record(format!("run {}", args.join(" ")));
        if self.faults.nonzero_exit {
            return 1;
        }
        let input = args
            .iter()
            .position(|a| a == "-i")
            .and_then(|i| args.get(i + 1))
            .and_then(|name| self.files.get(name))
            .cloned()
            .unwrap_or_default();
        self.files.insert(OUTPUT_NAME.to_string(), encoded(&input));
        0
    }

    fn read(&self, name: &str) -> AdmockResult<Vec<u8>> {
        self.record(format!("read {name}"));
        self.files
            .get(name)
            .cloned()
            .ok_or_else(|| AdmockError::transcode(format!("{name} does not exist")))
    }

    fn delete(&mut self, name: &str) -> AdmockResult<()> {
        self.record(format!("delete {name}"));
        self.files
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| AdmockError::transcode(format!("{name} does not exist")))
    }
}

struct FakeFileApi(Workspace);

#[async_trait::async_trait]
impl FileApiEncoder for FakeFileApi {
    async fn load(&mut self) -> AdmockResult<()> {
        self.0.load()
    }

    async fn write_file(&mut self, name: &str, data: &[u8]) -> AdmockResult<()> {
        self.0.write(name, data);
        Ok(())
    }

    async fn exec(&mut self, args: &[String]) -> AdmockResult<i32> {
        Ok(self.0.run(args))
    }

    async fn read_file(&mut self, name: &str) -> AdmockResult<Vec<u8>> {
        self.0.read(name)
    }

    async fn delete_file(&mut self, name: &str) -> AdmockResult<()> {
        self.0.delete(name)
    }
}

struct FakeLegacy(Workspace);

#[async_trait::async_trait]
impl LegacyFsEncoder for FakeLegacy {
    async fn load(&mut self) -> AdmockResult<()> {
        self.0.load()
    }

    fn fs(&mut self, op: FsOp<'_>) -> AdmockResult<FsResult> {
        match op {
            FsOp::WriteFile(name, data) => {
                self.0.write(name, data);
                Ok(FsResult::Done)
            }
            FsOp::ReadFile(name) => self.0.read(name).map(FsResult::Data),
            FsOp::Unlink(name) => self.0.delete(name).map(|_| FsResult::Done),
        }
    }

    fn run(&mut self, args: &[String], on_done: RunCallback) -> AdmockResult<()> {
        let code = self.0.run(args);
        if self.0.faults.drop_callback {
            drop(on_done);
        } else {
            on_done(code);
        }
        Ok(())
    }
}

/// Loader that hands out a fresh fake module per call.
pub struct FakeLoader {
    pub shape: Shape,
    pub faults: Faults,
    pub log: CallLog,
    loads: AtomicUsize,
}

impl FakeLoader {
    pub fn new(shape: Shape) -> Self {
        Self::with_faults(shape, Faults::default())
    }

    pub fn with_faults(shape: Shape, faults: Faults) -> Self {
        Self {
            shape,
            faults,
            log: Arc::new(Mutex::new(Vec::new())),
            loads: AtomicUsize::new(0),
        }
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl EncoderLoader for FakeLoader {
    async fn load_module(&self) -> AdmockResult<EncoderModule> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.faults.fail_module {
            return Err(AdmockError::setup("encoder module could not be fetched"));
        }
        let workspace = Workspace {
            log: Arc::clone(&self.log),
            faults: self.faults,
            files: HashMap::new(),
        };
        Ok(match self.shape {
            Shape::FileApi => EncoderModule::FileApi(Box::new(FakeFileApi(workspace))),
            Shape::LegacyFs => EncoderModule::LegacyFs(Box::new(FakeLegacy(workspace))),
        })
    }
}

/// Progress callback that keeps every report.
pub fn progress_sink() -> (ProgressCallback, Arc<Mutex<Vec<ExportProgress>>>) {
    let reports = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&reports);
    let callback: ProgressCallback = Box::new(move |p| sink.lock().unwrap().push(p));
    (callback, reports)
}
