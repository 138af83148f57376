//! Fake collaborators and fixtures for tests.
//!
//! The fakes count their invocations so tests can assert how often the
//! external services were reached.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use tempfile::TempDir;

use crate::cache::{ArtifactCache, KeyHasher};
use crate::crt::{CompileError, CompileRequest, CompiledArtifact, CrtCompiler, Progress};
use crate::def::{
  BuiltinMacroMode, Diagnostic, OutputOptions, PreprocessError, PreprocessOutput, PreprocessRequest, Preprocessor,
  Severity,
};
use crate::implib::{EmitError, ImportLibEmitter};
use crate::target::MachineType;

/// Owned copy of a [`PreprocessRequest`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
  pub source: PathBuf,
  pub include_dirs: Vec<PathBuf>,
  pub builtins: BuiltinMacroMode,
  pub defines: Vec<(String, Option<String>)>,
  pub output: OutputOptions,
}

pub struct FakePreprocessor {
  text: String,
  diagnostics: Vec<Diagnostic>,
  failure: Option<String>,
  calls: AtomicUsize,
  last: Mutex<Option<RecordedRequest>>,
}

impl FakePreprocessor {
  pub fn expanding_to(text: &str) -> Self {
    Self {
      text: text.to_string(),
      diagnostics: Vec::new(),
      failure: None,
      calls: AtomicUsize::new(0),
      last: Mutex::new(None),
    }
  }

  pub fn failing(message: &str) -> Self {
    let mut pp = Self::expanding_to("");
    pp.failure = Some(message.to_string());
    pp
  }

  pub fn with_diagnostic(mut self, severity: Severity, message: &str) -> Self {
    self.diagnostics.push(Diagnostic {
      severity,
      message: message.to_string(),
      location: Some("foo.def.in:1".to_string()),
    });
    self
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }

  pub fn last_request(&self) -> Option<RecordedRequest> {
    self.last.lock().unwrap().clone()
  }
}

impl Preprocessor for FakePreprocessor {
  fn preprocess(&self, request: &PreprocessRequest<'_>) -> Result<PreprocessOutput, PreprocessError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    *self.last.lock().unwrap() = Some(RecordedRequest {
      source: request.source.to_path_buf(),
      include_dirs: request.include_dirs.to_vec(),
      builtins: request.builtins,
      defines: request.defines.clone(),
      output: request.output,
    });
    if let Some(message) = &self.failure {
      return Err(PreprocessError(message.clone()));
    }
    Ok(PreprocessOutput {
      text: self.text.clone(),
      diagnostics: self.diagnostics.clone(),
    })
  }
}

#[derive(Debug, Clone)]
pub struct EmitCall {
  pub def_path: PathBuf,
  pub machine: MachineType,
  pub dest: PathBuf,
}

/// Emitter writing the definition text behind an archive magic.
pub struct FakeEmitter {
  failure: Option<String>,
  delay: Duration,
  calls: AtomicUsize,
  last: Mutex<Option<EmitCall>>,
}

impl FakeEmitter {
  pub fn new() -> Self {
    Self {
      failure: None,
      delay: Duration::ZERO,
      calls: AtomicUsize::new(0),
      last: Mutex::new(None),
    }
  }

  pub fn failing(message: &str) -> Self {
    Self {
      failure: Some(message.to_string()),
      ..Self::new()
    }
  }

  /// Sleep inside every emit, widening race windows.
  pub fn slow(delay: Duration) -> Self {
    Self { delay, ..Self::new() }
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }

  pub fn last_call(&self) -> Option<EmitCall> {
    self.last.lock().unwrap().clone()
  }
}

impl ImportLibEmitter for FakeEmitter {
  fn emit(&self, def_path: &Path, machine: MachineType, dest: &Path) -> Result<(), EmitError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    *self.last.lock().unwrap() = Some(EmitCall {
      def_path: def_path.to_path_buf(),
      machine,
      dest: dest.to_path_buf(),
    });
    thread::sleep(self.delay);
    if let Some(message) = &self.failure {
      return Err(EmitError(message.clone()));
    }
    let def = fs::read(def_path).map_err(|e| EmitError(e.to_string()))?;
    let mut bytes = b"!<arch>\n".to_vec();
    bytes.extend(def);
    fs::write(dest, bytes).map_err(|e| EmitError(e.to_string()))
  }
}

/// Compiler writing a placeholder artifact, either into a plain directory or
/// through an [`ArtifactCache`].
pub struct FakeCompiler {
  out_root: PathBuf,
  cache: Option<ArtifactCache>,
  failure: Option<String>,
  calls: AtomicUsize,
  last: Mutex<Option<CompileRequest>>,
}

impl FakeCompiler {
  pub fn new(out_root: impl Into<PathBuf>) -> Self {
    Self {
      out_root: out_root.into(),
      cache: None,
      failure: None,
      calls: AtomicUsize::new(0),
      last: Mutex::new(None),
    }
  }

  pub fn cached(cache: ArtifactCache) -> Self {
    Self {
      cache: Some(cache),
      ..Self::new(PathBuf::new())
    }
  }

  pub fn failing(message: &str) -> Self {
    Self {
      failure: Some(message.to_string()),
      ..Self::new(PathBuf::new())
    }
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }

  pub fn last_request(&self) -> Option<CompileRequest> {
    self.last.lock().unwrap().clone()
  }
}

impl CrtCompiler for FakeCompiler {
  fn build(&self, request: &CompileRequest, progress: &dyn Progress) -> Result<CompiledArtifact, CompileError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    *self.last.lock().unwrap() = Some(request.clone());
    if let Some(message) = &self.failure {
      return Err(CompileError(message.clone()));
    }

    progress.begin(&request.name, request.sources.len());
    for done in 1..=request.sources.len() {
      progress.advance(done);
    }

    match &self.cache {
      Some(cache) => {
        let mut hasher = KeyHasher::new();
        hasher.add_str(&request.name).add_str(&request.target.triple());
        let published = cache
          .fetch_or_build(&hasher.finish(), &request.name, |dir| {
            fs::write(dir.join(&request.name), request.name.as_bytes()).map_err(crate::error::BuildError::cache_io(
              "fake compile",
              dir,
            ))
          })
          .map_err(|e| CompileError(e.to_string()))?;
        Ok(CompiledArtifact {
          path: published.path,
          lock: Some(published.lock),
        })
      }
      None => {
        let dir = self.out_root.join(request.target.triple());
        fs::create_dir_all(&dir).map_err(|e| CompileError(e.to_string()))?;
        let path = dir.join(&request.name);
        fs::write(&path, request.name.as_bytes()).map_err(|e| CompileError(e.to_string()))?;
        Ok(CompiledArtifact { path, lock: None })
      }
    }
  }
}

/// Progress handle recording every event as text.
#[derive(Default)]
pub struct RecordingProgress {
  events: Mutex<Vec<String>>,
}

impl RecordingProgress {
  pub fn events(&self) -> Vec<String> {
    self.events.lock().unwrap().clone()
  }
}

impl Progress for RecordingProgress {
  fn begin(&self, name: &str, total: usize) {
    self.events.lock().unwrap().push(format!("begin {name} {total}"));
  }

  fn advance(&self, completed: usize) {
    self.events.lock().unwrap().push(format!("advance {completed}"));
  }
}

/// Temporary library root (`lib/mingw/...`) and cache root.
pub struct LibFixture {
  temp: TempDir,
}

impl LibFixture {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("lib").join("mingw")).unwrap();
    Self { temp }
  }

  pub fn lib_root(&self) -> PathBuf {
    self.temp.path().join("lib")
  }

  pub fn cache_root(&self) -> PathBuf {
    self.temp.path().join("cache")
  }

  pub fn scratch(&self) -> PathBuf {
    self.temp.path().join("scratch")
  }

  /// Write `contents` at `relative` under the MinGW root.
  pub fn write_def(&self, relative: &str, contents: &str) -> PathBuf {
    let path = self.lib_root().join("mingw").join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, contents).unwrap();
    path
  }
}
