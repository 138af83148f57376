//! MinGW C runtime objects built from source.
//!
//! Three artifacts are produced on demand: the executable and DLL startup
//! objects and the `libmingw32` support library. Each is described by a
//! [`CompileRequest`] assembled from the static tables in [`sources`] and the
//! flags in [`flags`]; the compiling itself belongs to a [`CrtCompiler`].

pub mod compiler;
pub mod flags;
pub mod sources;

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::config::SessionConfig;
use crate::error::BuildError;
use crate::target::Target;

pub use compiler::{
  CSourceFile, CompileError, CompileOptions, CompileRequest, CompiledArtifact, CrtCompiler, NoProgress, OutputKind,
  Progress,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrtFile {
  /// Executable startup object.
  Crt2O,
  /// DLL startup object.
  DllCrt2O,
  Mingw32Lib,
}

impl CrtFile {
  pub fn all() -> [CrtFile; 3] {
    [Self::Crt2O, Self::DllCrt2O, Self::Mingw32Lib]
  }

  /// Registry name of the produced artifact.
  pub fn name(&self) -> &'static str {
    match self {
      Self::Crt2O => "crt2.o",
      Self::DllCrt2O => "dllcrt2.o",
      Self::Mingw32Lib => "libmingw32.lib",
    }
  }

  pub fn from_name(name: &str) -> Result<Self, BuildError> {
    Self::all()
      .into_iter()
      .find(|file| file.name() == name)
      .ok_or_else(|| BuildError::UnknownCrtFile { name: name.to_string() })
  }

  pub fn output_kind(&self) -> OutputKind {
    match self {
      Self::Crt2O | Self::DllCrt2O => OutputKind::Object,
      Self::Mingw32Lib => OutputKind::StaticLib,
    }
  }
}

impl fmt::Display for CrtFile {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

impl FromStr for CrtFile {
  type Err = BuildError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::from_name(s)
  }
}

/// Join a `/`-separated table entry onto `root` component by component.
fn source_path(root: &Path, relative: &str) -> PathBuf {
  relative.split('/').fold(root.to_path_buf(), |path, part| path.join(part))
}

/// Drop repeated entries, keeping the first occurrence of each.
fn dedup_in_order<'a>(entries: impl IntoIterator<Item = &'a str>) -> Vec<&'a str> {
  let mut seen = HashSet::new();
  entries.into_iter().filter(|entry| seen.insert(*entry)).collect()
}

/// Source table entries for `file` on `target`, relative to the MinGW root.
pub fn source_list(file: CrtFile, target: Target) -> Vec<&'static str> {
  match file {
    CrtFile::Crt2O => vec![sources::CRT2_SRC],
    CrtFile::DllCrt2O => vec![sources::DLLCRT2_SRC],
    CrtFile::Mingw32Lib => {
      let arch = sources::arch_tables(target.arch).iter().flat_map(|table| table.iter().copied());
      dedup_in_order(sources::MINGW32_GENERIC_SRC.iter().copied().chain(arch))
    }
  }
}

/// Assemble the compiler request for `file`.
pub fn compile_request(config: &SessionConfig, target: Target, file: CrtFile) -> CompileRequest {
  let mingw_root = config.mingw_root();
  let mut base = flags::base_cc_args(&config.lib_root);
  if matches!(file, CrtFile::Crt2O | CrtFile::DllCrt2O) {
    base.extend(flags::STARTUP_OBJECT_FLAGS.iter().map(|s| s.to_string()));
  }

  let sources = source_list(file, target)
    .into_iter()
    .map(|relative| CSourceFile {
      path: source_path(&mingw_root, relative),
      extra_flags: base.clone(),
    })
    .collect();

  CompileRequest {
    name: file.name().to_string(),
    target,
    output: file.output_kind(),
    sources,
    options: CompileOptions {
      unwind_tables: target.arch.unwind_tables(),
      optimize: config.optimize,
      lto: false,
    },
  }
}
