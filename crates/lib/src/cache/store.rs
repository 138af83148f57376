//! Cache directory layout.
//!
//! ```text
//! <cache>/
//! ├── h/                      # Manifest records and locks, one pair per digest
//! │   ├── <digest>.json
//! │   └── <digest>.lock
//! └── o/                      # Outputs (immutable once recorded)
//!     └── <digest>/
//!         └── <artifact-file>
//! ```

use std::path::{Path, PathBuf};

use crate::cache::key::CacheKey;
use crate::consts::{MANIFEST_DIR, OBJECT_DIR};

pub fn manifest_dir(root: &Path) -> PathBuf {
  root.join(MANIFEST_DIR)
}

pub fn record_path(root: &Path, key: &CacheKey) -> PathBuf {
  manifest_dir(root).join(format!("{}.json", key))
}

pub fn lock_path(root: &Path, key: &CacheKey) -> PathBuf {
  manifest_dir(root).join(format!("{}.lock", key))
}

pub fn object_dir(root: &Path, key: &CacheKey) -> PathBuf {
  root.join(OBJECT_DIR).join(key.as_str())
}

/// Path of an artifact relative to the cache root (`o/<digest>/<file>`).
pub fn artifact_sub_path(key: &CacheKey, file_name: &str) -> PathBuf {
  PathBuf::from(OBJECT_DIR).join(key.as_str()).join(file_name)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn key() -> CacheKey {
    CacheKey("abc123def45678901234567890abcdef".to_string())
  }

  #[test]
  fn object_dir_is_namespaced_by_digest() {
    let path = object_dir(Path::new("/cache"), &key());
    assert_eq!(path, PathBuf::from("/cache/o/abc123def45678901234567890abcdef"));
  }

  #[test]
  fn manifest_files_share_a_directory() {
    let root = Path::new("/cache");
    assert_eq!(record_path(root, &key()).parent(), Some(manifest_dir(root).as_path()));
    assert_eq!(lock_path(root, &key()).parent(), Some(manifest_dir(root).as_path()));
    assert!(record_path(root, &key()).ends_with("abc123def45678901234567890abcdef.json"));
  }

  #[test]
  fn sub_path_is_relative() {
    let sub = artifact_sub_path(&key(), "foo.lib");
    assert!(sub.is_relative());
    assert_eq!(sub, PathBuf::from("o").join(key().as_str()).join("foo.lib"));
    assert_eq!(Path::new("/cache").join(&sub), object_dir(Path::new("/cache"), &key()).join("foo.lib"));
  }
}
