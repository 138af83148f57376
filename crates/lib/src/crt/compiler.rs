//! Interface to the external C compiler service.

use std::path::PathBuf;

use thiserror::Error;

use crate::cache::BuildLock;
use crate::config::OptimizeMode;
use crate::target::{Target, UnwindTables};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
  Object,
  StaticLib,
}

/// One translation unit and the flags it needs beyond the shared ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CSourceFile {
  pub path: PathBuf,
  pub extra_flags: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
  pub unwind_tables: UnwindTables,
  pub optimize: OptimizeMode,
  /// Whether link-time optimization may be applied to the output.
  pub lto: bool,
}

#[derive(Debug, Clone)]
pub struct CompileRequest {
  /// Final artifact name (`crt2.o`, `libmingw32.lib`).
  pub name: String,
  pub target: Target,
  pub output: OutputKind,
  pub sources: Vec<CSourceFile>,
  pub options: CompileOptions,
}

/// A finished compiler output.
#[derive(Debug)]
pub struct CompiledArtifact {
  pub path: PathBuf,
  /// Lock pinning the compiler's own cache entry, if it keeps one.
  pub lock: Option<BuildLock>,
}

#[derive(Debug, Error)]
#[error("{0}")]
pub struct CompileError(pub String);

/// Progress reporting handle passed through to the compiler.
pub trait Progress: Send + Sync {
  fn begin(&self, name: &str, total: usize);
  fn advance(&self, completed: usize);
}

/// Progress handle that reports nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl Progress for NoProgress {
  fn begin(&self, _name: &str, _total: usize) {}
  fn advance(&self, _completed: usize) {}
}

/// External service compiling CRT sources into an object or static library.
pub trait CrtCompiler: Send + Sync {
  fn build(&self, request: &CompileRequest, progress: &dyn Progress) -> Result<CompiledArtifact, CompileError>;
}
