//! Process-backed collaborators built on the LLVM toolchain.
//!
//! - [`ClangPreprocessor`] - `clang -E` for `.def.in` templates
//! - [`ClangCompiler`] - `clang -c` plus `llvm-ar` for the CRT
//! - [`DllToolEmitter`] - `llvm-dlltool` for import libraries

pub mod clang;
pub mod command;
pub mod dlltool;

use std::path::PathBuf;
use std::sync::Arc;

use crate::cache::ArtifactCache;
use crate::config::SessionConfig;
use crate::session::Collaborators;

pub use clang::{ClangCompiler, ClangPreprocessor};
pub use command::{ToolError, ToolOutput};
pub use dlltool::DllToolEmitter;

pub const CLANG_ENV: &str = "CRTKIT_CLANG";
pub const AR_ENV: &str = "CRTKIT_AR";
pub const DLLTOOL_ENV: &str = "CRTKIT_DLLTOOL";

/// Executables used by the process-backed collaborators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
  pub clang: PathBuf,
  pub ar: PathBuf,
  pub dlltool: PathBuf,
}

impl Default for ToolPaths {
  fn default() -> Self {
    Self {
      clang: PathBuf::from("clang"),
      ar: PathBuf::from("llvm-ar"),
      dlltool: PathBuf::from("llvm-dlltool"),
    }
  }
}

impl ToolPaths {
  /// Defaults, overridden by `CRTKIT_CLANG`, `CRTKIT_AR` and `CRTKIT_DLLTOOL`.
  pub fn from_env() -> Self {
    let defaults = Self::default();
    let var = |name: &str, fallback: PathBuf| std::env::var_os(name).map(PathBuf::from).unwrap_or(fallback);
    Self {
      clang: var(CLANG_ENV, defaults.clang),
      ar: var(AR_ENV, defaults.ar),
      dlltool: var(DLLTOOL_ENV, defaults.dlltool),
    }
  }

  /// Collaborators running these tools, with CRT outputs cached under
  /// `config.cache_root`.
  pub fn collaborators(&self, config: &SessionConfig) -> Collaborators {
    let cache = ArtifactCache::new(&config.cache_root, &config.tool_version);
    Collaborators {
      compiler: Arc::new(ClangCompiler::new(&self.clang, &self.ar, cache)),
      preprocessor: Arc::new(ClangPreprocessor::new(&self.clang)),
      emitter: Arc::new(DllToolEmitter::new(&self.dlltool)),
    }
  }
}
