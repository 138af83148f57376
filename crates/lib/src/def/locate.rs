//! Definition file lookup.
//!
//! Search order, first hit wins:
//!
//! 1. `<mingw>/<lib32|lib64|libarm32|libarm64>/<name>.def`
//! 2. `<mingw>/lib-common/<name>.def`
//! 3. `<mingw>/lib-common/<name>.def.in` (template, needs preprocessing)

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::error::BuildError;
use crate::target::Arch;

/// Directory holding definitions shared by all architectures.
pub const COMMON_DIR: &str = "lib-common";

/// Directory holding headers included by `.def.in` templates.
pub const DEF_INCLUDE_DIR: &str = "def-include";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DefTier {
  ArchSpecific,
  Common,
  CommonTemplate,
}

/// A located definition file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionSource {
  pub path: PathBuf,
  pub tier: DefTier,
}

impl DefinitionSource {
  pub fn needs_preprocessing(&self) -> bool {
    self.tier == DefTier::CommonTemplate
  }
}

/// Candidate paths in search order.
pub fn def_candidates(mingw_root: &Path, arch: Arch, name: &str) -> [(PathBuf, DefTier); 3] {
  let common = mingw_root.join(COMMON_DIR);
  [
    (mingw_root.join(arch.lib_dir()).join(format!("{name}.def")), DefTier::ArchSpecific),
    (common.join(format!("{name}.def")), DefTier::Common),
    (common.join(format!("{name}.def.in")), DefTier::CommonTemplate),
  ]
}

/// Find the best definition for `name` on `arch`.
///
/// Returns [`BuildError::DefinitionNotFound`] when no tier has a file; any
/// other I/O failure while probing is [`BuildError::DefinitionIo`].
pub fn find_def(mingw_root: &Path, arch: Arch, name: &str) -> Result<DefinitionSource, BuildError> {
  for (path, tier) in def_candidates(mingw_root, arch, name) {
    match fs::metadata(&path) {
      Ok(meta) if meta.is_file() => {
        debug!(name = %name, path = ?path, tier = ?tier, "found definition");
        return Ok(DefinitionSource { path, tier });
      }
      Ok(_) => continue,
      Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
      Err(source) => return Err(BuildError::DefinitionIo { path, source }),
    }
  }

  Err(BuildError::DefinitionNotFound { name: name.to_string() })
}

/// Whether any definition exists for `name` on `arch`.
pub fn lib_exists(mingw_root: &Path, arch: Arch, name: &str) -> Result<bool, BuildError> {
  match find_def(mingw_root, arch, name) {
    Ok(_) => Ok(true),
    Err(BuildError::DefinitionNotFound { .. }) => Ok(false),
    Err(e) => Err(e),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  fn touch(root: &Path, rel: &str) -> PathBuf {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, "LIBRARY foo\nEXPORTS\nfoo\n").unwrap();
    path
  }

  #[test]
  fn fallback_order() {
    let temp = TempDir::new().unwrap();
    let root = temp.path();
    let arch_def = touch(root, "lib64/foo.def");
    let common_def = touch(root, "lib-common/foo.def");
    let template = touch(root, "lib-common/foo.def.in");

    let found = find_def(root, Arch::X86_64, "foo").unwrap();
    assert_eq!(found.path, arch_def);
    assert_eq!(found.tier, DefTier::ArchSpecific);
    assert!(!found.needs_preprocessing());

    fs::remove_file(&arch_def).unwrap();
    let found = find_def(root, Arch::X86_64, "foo").unwrap();
    assert_eq!(found.path, common_def);
    assert_eq!(found.tier, DefTier::Common);

    fs::remove_file(&common_def).unwrap();
    let found = find_def(root, Arch::X86_64, "foo").unwrap();
    assert_eq!(found.path, template);
    assert!(found.needs_preprocessing());
  }

  #[test]
  fn other_architectures_are_ignored() {
    let temp = TempDir::new().unwrap();
    touch(temp.path(), "lib32/foo.def");
    let common = touch(temp.path(), "lib-common/foo.def");

    let found = find_def(temp.path(), Arch::Aarch64, "foo").unwrap();
    assert_eq!(found.path, common);
  }

  #[test]
  fn thumb_shares_arm32_definitions() {
    let temp = TempDir::new().unwrap();
    let def = touch(temp.path(), "libarm32/foo.def");
    assert_eq!(find_def(temp.path(), Arch::Thumb, "foo").unwrap().path, def);
  }

  #[test]
  fn missing_everywhere_is_not_found() {
    let temp = TempDir::new().unwrap();
    let err = find_def(temp.path(), Arch::X86, "nothere").unwrap_err();
    assert!(matches!(err, BuildError::DefinitionNotFound { ref name } if name == "nothere"));
    assert!(!err.is_fatal());
    assert!(!lib_exists(temp.path(), Arch::X86, "nothere").unwrap());
  }

  #[test]
  fn directory_in_place_of_file_is_skipped() {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("lib64/foo.def")).unwrap();
    let common = touch(temp.path(), "lib-common/foo.def");
    assert_eq!(find_def(temp.path(), Arch::X86_64, "foo").unwrap().path, common);
  }

  #[test]
  #[cfg(unix)]
  fn candidate_errors_other_than_absence_are_fatal() {
    let temp = TempDir::new().unwrap();
    // A regular file where a directory is expected yields ENOTDIR, not ENOENT.
    fs::write(temp.path().join("lib64"), "not a directory").unwrap();

    let err = find_def(temp.path(), Arch::X86_64, "foo").unwrap_err();
    assert!(matches!(err, BuildError::DefinitionIo { .. }));
    assert!(err.is_fatal());
  }

  #[test]
  fn lib_exists_for_present_definition() {
    let temp = TempDir::new().unwrap();
    touch(temp.path(), "lib-common/kernel32.def.in");
    assert!(lib_exists(temp.path(), Arch::X86_64, "kernel32").unwrap());
  }
}
