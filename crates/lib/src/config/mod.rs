//! Session configuration.
//!
//! Configuration is resolved once per session from environment variables,
//! with the CLI layering its own flags on top.

pub mod paths;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::consts::{MINGW_DIR, TOOL_VERSION};

pub const CACHE_DIR_ENV: &str = "CRTKIT_CACHE_DIR";
pub const LIB_DIR_ENV: &str = "CRTKIT_LIB_DIR";
pub const NO_BACKEND_ENV: &str = "CRTKIT_NO_BACKEND";
pub const OPTIMIZE_ENV: &str = "CRTKIT_OPTIMIZE";

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("cannot determine a cache directory; set {CACHE_DIR_ENV}")]
  NoCacheDir,

  #[error("cannot determine a library directory; set {LIB_DIR_ENV}")]
  NoLibDir,

  #[error("invalid optimize mode {0:?} (expected debug, release-safe, release-fast or release-small)")]
  InvalidOptimize(String),
}

/// Optimization profile requested for CRT sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OptimizeMode {
  Debug,
  ReleaseSafe,
  #[default]
  ReleaseFast,
  ReleaseSmall,
}

impl OptimizeMode {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Debug => "debug",
      Self::ReleaseSafe => "release-safe",
      Self::ReleaseFast => "release-fast",
      Self::ReleaseSmall => "release-small",
    }
  }
}

impl fmt::Display for OptimizeMode {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for OptimizeMode {
  type Err = ConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "debug" => Ok(Self::Debug),
      "release-safe" => Ok(Self::ReleaseSafe),
      "release-fast" => Ok(Self::ReleaseFast),
      "release-small" => Ok(Self::ReleaseSmall),
      other => Err(ConfigError::InvalidOptimize(other.to_string())),
    }
  }
}

/// Everything a [`Session`](crate::session::Session) needs to know about its
/// environment.
#[derive(Debug, Clone)]
pub struct SessionConfig {
  /// Root of the shared artifact cache (`h/` manifests, `o/` outputs).
  pub cache_root: PathBuf,
  /// Root of the bundled library sources (`mingw/`, `libc/`).
  pub lib_root: PathBuf,
  /// Version string mixed into every cache key.
  pub tool_version: String,
  /// Whether the binary-emitting backend is built into the host.
  pub backend_available: bool,
  pub optimize: OptimizeMode,
}

impl SessionConfig {
  pub fn new(cache_root: impl Into<PathBuf>, lib_root: impl Into<PathBuf>) -> Self {
    Self {
      cache_root: cache_root.into(),
      lib_root: lib_root.into(),
      tool_version: TOOL_VERSION.to_string(),
      backend_available: true,
      optimize: OptimizeMode::default(),
    }
  }

  /// Resolve configuration from `CRTKIT_*` variables, falling back to the
  /// platform cache and data directories.
  pub fn from_env() -> Result<Self, ConfigError> {
    let cache_root = match std::env::var_os(CACHE_DIR_ENV) {
      Some(dir) => PathBuf::from(dir),
      None => paths::cache_dir().ok_or(ConfigError::NoCacheDir)?,
    };

    let lib_root = match std::env::var_os(LIB_DIR_ENV) {
      Some(dir) => PathBuf::from(dir),
      None => paths::data_dir().ok_or(ConfigError::NoLibDir)?.join("lib"),
    };

    let mut config = Self::new(cache_root, lib_root);

    if let Ok(value) = std::env::var(NO_BACKEND_ENV) {
      config.backend_available = !matches!(value.as_str(), "1" | "true" | "yes");
    }

    if let Ok(value) = std::env::var(OPTIMIZE_ENV) {
      config.optimize = value.parse()?;
    }

    Ok(config)
  }

  /// Directory holding the MinGW-w64 sources and definition files.
  pub fn mingw_root(&self) -> PathBuf {
    self.lib_root.join(MINGW_DIR)
  }

  /// Library root rendered as the identity string used in cache keys.
  pub fn lib_root_identity(&self) -> String {
    self.lib_root.to_string_lossy().into_owned()
  }
}
