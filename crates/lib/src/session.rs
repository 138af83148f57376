//! Build session: the explicit context every artifact request runs in.
//!
//! A [`Session`] owns the cache handle, the artifact registry, and the
//! external collaborators. It is created once per host build, shared by
//! reference across worker threads, and consumed by [`Session::teardown`],
//! which releases every lock the registry holds.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::cache::ArtifactCache;
use crate::config::SessionConfig;
use crate::crt::{self, CrtCompiler, CrtFile, NoProgress, Progress};
use crate::def::{self, DefinitionSource, Preprocessor};
use crate::error::BuildError;
use crate::implib::{self, ImportLibEmitter};
use crate::registry::{ArtifactRegistry, Claim};
use crate::target::Target;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
  Crt,
  ImportLib,
}

impl fmt::Display for ArtifactKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Crt => write!(f, "crt"),
      Self::ImportLib => write!(f, "import library"),
    }
  }
}

/// A request for one artifact by logical name.
///
/// For [`ArtifactKind::Crt`] the name is the file name (`crt2.o`); for
/// [`ArtifactKind::ImportLib`] it is the library name (`kernel32`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRequest {
  pub name: String,
  pub kind: ArtifactKind,
  pub target: Target,
}

impl ArtifactRequest {
  pub fn crt(file: CrtFile, target: Target) -> Self {
    Self {
      name: file.name().to_string(),
      kind: ArtifactKind::Crt,
      target,
    }
  }

  pub fn import_lib(name: impl Into<String>, target: Target) -> Self {
    Self {
      name: name.into(),
      kind: ArtifactKind::ImportLib,
      target,
    }
  }
}

/// External services the session delegates to.
#[derive(Clone)]
pub struct Collaborators {
  pub compiler: Arc<dyn CrtCompiler>,
  pub preprocessor: Arc<dyn Preprocessor>,
  pub emitter: Arc<dyn ImportLibEmitter>,
}

/// Registry key for `name` built for `target`.
///
/// Artifact names are only unique per target, so the registry keys are
/// qualified with the target triple.
pub fn registry_name(target: Target, name: &str) -> String {
  format!("{}/{}", target.triple(), name)
}

pub struct Session {
  config: SessionConfig,
  cache: ArtifactCache,
  registry: ArtifactRegistry,
  collaborators: Collaborators,
}

impl Session {
  pub fn new(config: SessionConfig, collaborators: Collaborators) -> Self {
    let cache = ArtifactCache::new(&config.cache_root, &config.tool_version);
    debug!(cache = ?config.cache_root, lib = ?config.lib_root, "session started");
    Self {
      config,
      cache,
      registry: ArtifactRegistry::new(),
      collaborators,
    }
  }

  pub fn config(&self) -> &SessionConfig {
    &self.config
  }

  pub fn cache(&self) -> &ArtifactCache {
    &self.cache
  }

  pub fn registry(&self) -> &ArtifactRegistry {
    &self.registry
  }

  /// Path of an artifact already built in this session.
  pub fn lookup(&self, target: Target, name: &str) -> Option<PathBuf> {
    self.registry.lookup(&registry_name(target, name))
  }

  /// Resolve `request`, building the artifact if needed.
  ///
  /// `Ok(None)` means no artifact exists for an import library and the
  /// linker's default search should handle the name.
  pub fn request(&self, request: &ArtifactRequest) -> Result<Option<PathBuf>, BuildError> {
    match request.kind {
      ArtifactKind::Crt => {
        let file = CrtFile::from_name(&request.name)?;
        self.build_crt_file(request.target, file, &NoProgress).map(Some)
      }
      ArtifactKind::ImportLib => {
        let name = request.name.strip_suffix(".lib").unwrap_or(&request.name);
        self.build_import_lib(request.target, name)
      }
    }
  }

  /// Build (or reuse) one of the CRT objects.
  pub fn build_crt_file(&self, target: Target, file: CrtFile, progress: &dyn Progress) -> Result<PathBuf, BuildError> {
    self.ensure_backend(file.name())?;

    let guard = match self.registry.claim(&registry_name(target, file.name())) {
      Claim::Ready(path) => return Ok(path),
      Claim::Owned(guard) => guard,
    };

    let request = crt::compile_request(&self.config, target, file);
    info!(name = %file, target = %target, sources = request.sources.len(), "building CRT file");

    let artifact = self
      .collaborators
      .compiler
      .build(&request, progress)
      .map_err(|e| BuildError::CompileFailed {
        name: file.name().to_string(),
        message: e.to_string(),
      })?;

    Ok(guard.publish(artifact.path, artifact.lock))
  }

  /// Build (or reuse) the import library for `name`.
  ///
  /// Returns `Ok(None)` when no definition file exists at any tier.
  pub fn build_import_lib(&self, target: Target, name: &str) -> Result<Option<PathBuf>, BuildError> {
    let lib_name = implib::lib_file_name(name);
    self.ensure_backend(&lib_name)?;

    let guard = match self.registry.claim(&registry_name(target, &lib_name)) {
      Claim::Ready(path) => return Ok(Some(path)),
      Claim::Owned(guard) => guard,
    };

    let source = match self.find_def(target, name) {
      Ok(source) => source,
      Err(BuildError::DefinitionNotFound { .. }) => {
        debug!(name = %name, target = %target, "no definition file, deferring to linker search");
        return Ok(None);
      }
      Err(e) => return Err(e),
    };

    let published = implib::fetch_import_lib(
      &self.config,
      &self.cache,
      self.collaborators.preprocessor.as_ref(),
      self.collaborators.emitter.as_ref(),
      target,
      name,
      &source,
    )?;
    if !published.fresh {
      debug!(name = %lib_name, digest = %published.key, "reused cached import library");
    }

    Ok(Some(guard.publish(published.path, Some(published.lock))))
  }

  /// Locate the definition for `name` without building anything.
  pub fn find_def(&self, target: Target, name: &str) -> Result<DefinitionSource, BuildError> {
    def::find_def(&self.config.mingw_root(), target.arch, name)
  }

  pub fn lib_exists(&self, target: Target, name: &str) -> Result<bool, BuildError> {
    def::lib_exists(&self.config.mingw_root(), target.arch, name)
  }

  /// End the session, releasing every registry entry and its lock. Returns
  /// how many entries were released.
  pub fn teardown(self) -> usize {
    let released = self.registry.release_all();
    debug!(released, "session torn down");
    released
  }

  fn ensure_backend(&self, artifact: &str) -> Result<(), BuildError> {
    if self.config.backend_available {
      Ok(())
    } else {
      Err(BuildError::BackendUnavailable {
        artifact: artifact.to_string(),
      })
    }
  }
}
