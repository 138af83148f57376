//! Manifest records.
//!
//! A record at `h/<digest>.json` marks a digest's output as complete. It is
//! written once, after the artifact exists, through a temp file and rename so
//! readers never observe a half-written record.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::key::{CacheKey, hash_file};

/// Current record format version.
pub const RECORD_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestRecord {
  pub version: u32,
  pub digest: String,
  /// Artifact path relative to the cache root.
  pub artifact: String,
  pub tool_version: String,
  /// Full SHA-256 of the artifact bytes.
  pub output_hash: String,
}

/// Read the record at `path`.
///
/// Returns `Ok(None)` if the record doesn't exist or can't be parsed (an
/// unparseable record is treated like an interrupted write). Other I/O errors
/// propagate.
pub fn read_record(path: &Path) -> io::Result<Option<ManifestRecord>> {
  let content = match fs::read_to_string(path) {
    Ok(content) => content,
    Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
    Err(e) => return Err(e),
  };

  match serde_json::from_str(&content) {
    Ok(record) => Ok(Some(record)),
    Err(e) => {
      debug!(path = ?path, error = %e, "unparseable manifest record, ignoring");
      Ok(None)
    }
  }
}

/// Atomically write `record` to `path`.
pub fn write_record(path: &Path, record: &ManifestRecord) -> io::Result<()> {
  let dir = path
    .parent()
    .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "record path has no parent"))?;
  let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
  serde_json::to_writer(&mut tmp, record).map_err(io::Error::other)?;
  tmp.write_all(b"\n")?;
  tmp.as_file().sync_all()?;
  tmp.persist(path).map_err(|e| e.error)?;
  Ok(())
}

/// Check that `record` describes a complete, intact artifact for `key`.
///
/// Returns `false` (rebuild) on digest mismatch, a missing artifact, or an
/// artifact whose bytes no longer match `output_hash`.
pub fn verify_record(cache_root: &Path, key: &CacheKey, record: &ManifestRecord) -> bool {
  if record.digest != key.0 {
    warn!(expected = %key, found = %record.digest, "manifest record digest mismatch");
    return false;
  }

  let artifact = cache_root.join(&record.artifact);
  match hash_file(&artifact) {
    Ok(hash) if hash.0 == record.output_hash => true,
    Ok(hash) => {
      warn!(
        path = ?artifact,
        expected = %record.output_hash,
        actual = %hash,
        "cached artifact corrupted, will rebuild"
      );
      false
    }
    Err(e) => {
      warn!(path = ?artifact, error = %e, "cached artifact unreadable, will rebuild");
      false
    }
  }
}
