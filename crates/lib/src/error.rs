//! Error taxonomy for artifact builds.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by artifact requests.
///
/// Only [`BuildError::DefinitionNotFound`] is non-fatal: it tells the caller
/// to let the linker's default library search handle the name.
#[derive(Debug, Error)]
pub enum BuildError {
  /// The binary-emitting backend is not available in this host.
  #[error("cannot build {artifact}: the binary-emitting backend is not available")]
  BackendUnavailable { artifact: String },

  /// No definition file exists at any search tier.
  #[error("no export definition found for library {name}")]
  DefinitionNotFound { name: String },

  /// Reading a definition candidate failed for a reason other than absence.
  #[error("failed to read definition candidate {path}: {source}")]
  DefinitionIo {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  /// The preprocessor reported an error or fatal diagnostic.
  #[error("preprocessing {path} for {name} failed:\n{message}")]
  PreprocessFailed {
    name: String,
    path: PathBuf,
    message: String,
  },

  /// The import library emitter reported failure.
  #[error("writing import library {name} failed: {message}")]
  EmitFailed { name: String, message: String },

  /// The CRT compiler reported failure.
  #[error("compiling {name} failed: {message}")]
  CompileFailed { name: String, message: String },

  /// Reading or writing cache state failed.
  #[error("cache {stage} failed at {path}: {source}")]
  CacheIoFailed {
    stage: &'static str,
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  /// An artifact pinned by this process no longer matches its recorded hash.
  #[error("cached artifact {path} changed while in use")]
  ArtifactChanged { path: PathBuf },

  /// An artifact name was published twice. This is a bug in the caller.
  #[error("artifact {name} is already registered")]
  DuplicateRegistration { name: String },

  /// A CRT request named a file this builder does not know how to produce.
  #[error("unknown CRT file: {name}")]
  UnknownCrtFile { name: String },
}

impl BuildError {
  /// Whether the error should abort the surrounding build.
  pub fn is_fatal(&self) -> bool {
    !matches!(self, Self::DefinitionNotFound { .. })
  }

  pub(crate) fn cache_io(stage: &'static str, path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
    let path = path.into();
    move |source| Self::CacheIoFailed { stage, path, source }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn only_missing_definition_is_non_fatal() {
    let missing = BuildError::DefinitionNotFound { name: "foo".into() };
    assert!(!missing.is_fatal());

    let emit = BuildError::EmitFailed {
      name: "foo.lib".into(),
      message: "boom".into(),
    };
    assert!(emit.is_fatal());
  }

  #[test]
  fn cache_io_carries_stage_and_path() {
    let err = BuildError::cache_io("record read", "/cache/h/abc.json")(io::Error::other("denied"));
    let message = err.to_string();
    assert!(message.contains("record read"));
    assert!(message.contains("/cache/h/abc.json"));
  }
}
