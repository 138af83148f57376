//! DLL import libraries built from export definitions.
//!
//! The definition found by [`find_def`](crate::def::find_def) is read once.
//! Those bytes feed the cache key and are written into the digest's output
//! directory (templates are expanded from that copy), so the emitter only ever
//! reads files the cache owns and the recorded digest always matches them.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::cache::{ArtifactCache, CacheKey, KeyHasher, Published};
use crate::config::SessionConfig;
use crate::def::locate::DEF_INCLUDE_DIR;
use crate::def::{DefinitionSource, Preprocessor, preprocess_def};
use crate::error::BuildError;
use crate::target::{MachineType, Target};

#[derive(Debug, Error)]
#[error("{0}")]
pub struct EmitError(pub String);

/// External service writing a COFF import library from a `.def` file.
pub trait ImportLibEmitter: Send + Sync {
  fn emit(&self, def_path: &Path, machine: MachineType, dest: &Path) -> Result<(), EmitError>;
}

/// Registry name of the import library for `name`.
pub fn lib_file_name(name: &str) -> String {
  format!("{name}.lib")
}

/// Read the definition bytes that both key and build are derived from.
pub fn read_definition(source: &DefinitionSource) -> Result<Vec<u8>, BuildError> {
  fs::read(&source.path).map_err(|e| BuildError::DefinitionIo {
    path: source.path.clone(),
    source: e,
  })
}

/// Cache key over the tool version, library root, target and definition
/// bytes.
///
/// The ABI only enters the key for templates, since it changes which macros
/// the expansion sees; literal definitions are ABI-independent.
pub fn import_lib_key(config: &SessionConfig, target: Target, source: &DefinitionSource, contents: &[u8]) -> CacheKey {
  let mut hasher = KeyHasher::new();
  hasher
    .add_str(&config.tool_version)
    .add_str(&config.lib_root_identity())
    .add_str(target.arch.tag());
  if source.needs_preprocessing() {
    hasher.add_str(target.abi.as_str());
  }
  hasher.add_bytes(contents);
  hasher.finish()
}

/// Fetch the import library for `source` from the cache, building it on a miss.
pub fn fetch_import_lib(
  config: &SessionConfig,
  cache: &ArtifactCache,
  preprocessor: &dyn Preprocessor,
  emitter: &dyn ImportLibEmitter,
  target: Target,
  name: &str,
  source: &DefinitionSource,
) -> Result<Published, BuildError> {
  let contents = read_definition(source)?;
  let key = import_lib_key(config, target, source, &contents);
  let lib_name = lib_file_name(name);
  debug!(name = %name, digest = %key, tier = ?source.tier, "resolved import library key");

  cache.fetch_or_build(&key, &lib_name, |out_dir| {
    let def_path = stage_definition(config, preprocessor, target, name, source, &contents, out_dir)?;
    emitter
      .emit(&def_path, target.arch.machine_type(), &out_dir.join(&lib_name))
      .map_err(|e| BuildError::EmitFailed {
        name: lib_name.clone(),
        message: e.to_string(),
      })
  })
}

/// Place the definition `<name>.def` inside `out_dir`, built from `contents`.
fn stage_definition(
  config: &SessionConfig,
  preprocessor: &dyn Preprocessor,
  target: Target,
  name: &str,
  source: &DefinitionSource,
  contents: &[u8],
  out_dir: &Path,
) -> Result<PathBuf, BuildError> {
  let def_path = out_dir.join(format!("{name}.def"));
  if !source.needs_preprocessing() {
    fs::write(&def_path, contents).map_err(BuildError::cache_io("definition staging", &def_path))?;
    return Ok(def_path);
  }

  let template_path = out_dir.join(format!("{name}.def.in"));
  fs::write(&template_path, contents).map_err(BuildError::cache_io("template staging", &template_path))?;
  let staged = DefinitionSource {
    path: template_path,
    tier: source.tier,
  };

  // Quoted includes still resolve next to the original template.
  let mut include_dirs = vec![config.mingw_root().join(DEF_INCLUDE_DIR)];
  if let Some(dir) = source.path.parent() {
    include_dirs.push(dir.to_path_buf());
  }
  preprocess_def(preprocessor, name, &staged, &include_dirs, target, &def_path)?;
  Ok(def_path)
}
