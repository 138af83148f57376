//! Content-addressed artifact cache.
//!
//! Every artifact is identified by a [`CacheKey`] over its build-relevant
//! inputs. The first request for a key builds the artifact into
//! `o/<digest>/` and records it in `h/<digest>.json`; later requests, from
//! this process or any other sharing the cache root, reuse the recorded path.
//!
//! # Per-request state machine
//!
//! - **Lookup**: shared lock on `h/<digest>.lock`, then read the record.
//!   A valid record is a hit.
//! - **Miss**: take the exclusive lock (retrying the lookup while anyone else
//!   holds it), re-check the record, then build.
//! - **Published**: the record is written (best effort) and the lock is
//!   downgraded to shared and handed to the caller.
//! - **Failed**: nothing is recorded and the lock is dropped, so a later
//!   request can retry.
//!
//! Every record a handle hands out a lock for is also pinned in memory. A
//! later request through the same handle finds it there even if the record
//! never reached disk, since its own shared lock would keep it from ever
//! taking the exclusive one.

pub mod key;
pub mod lock;
pub mod manifest;
pub mod store;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::BuildError;

pub use key::{CacheKey, ContentHash, KeyHasher};
pub use lock::{BuildLock, LockMode};
pub use manifest::ManifestRecord;

/// Pause between attempts while another worker holds a digest's lock.
const CONTENTION_BACKOFF: Duration = Duration::from_millis(10);

/// A cache entry that is complete on disk.
#[derive(Debug)]
pub struct Published {
  pub key: CacheKey,
  /// Artifact path relative to the cache root.
  pub sub_path: PathBuf,
  /// Absolute artifact path.
  pub path: PathBuf,
  /// Shared lock over the entry, to be transferred into the registry.
  pub lock: BuildLock,
  /// `true` if this request built the artifact, `false` on a hit.
  pub fresh: bool,
}

/// Shared artifact store rooted at one cache directory.
#[derive(Debug, Clone)]
pub struct ArtifactCache {
  root: PathBuf,
  tool_version: String,
  pinned: Arc<Mutex<HashMap<CacheKey, ManifestRecord>>>,
}

impl ArtifactCache {
  pub fn new(root: impl Into<PathBuf>, tool_version: impl Into<String>) -> Self {
    Self {
      root: root.into(),
      tool_version: tool_version.into(),
      pinned: Arc::default(),
    }
  }

  pub fn tool_version(&self) -> &str {
    &self.tool_version
  }

  /// Absolute output directory for `key`.
  pub fn object_dir(&self, key: &CacheKey) -> PathBuf {
    store::object_dir(&self.root, key)
  }

  /// Return the recorded artifact for `key`, building it with `produce` first
  /// if no valid record exists.
  ///
  /// `produce` receives the digest's empty output directory and must leave
  /// `file_name` inside it. Its error is returned unchanged.
  pub fn fetch_or_build<F>(&self, key: &CacheKey, file_name: &str, produce: F) -> Result<Published, BuildError>
  where
    F: FnOnce(&Path) -> Result<(), BuildError>,
  {
    let manifest_dir = store::manifest_dir(&self.root);
    fs::create_dir_all(&manifest_dir).map_err(BuildError::cache_io("manifest directory creation", &manifest_dir))?;

    let lock_path = store::lock_path(&self.root, key);
    let record_path = store::record_path(&self.root, key);

    let mut reported_wait = false;
    let exclusive = loop {
      let shared = BuildLock::acquire(&lock_path, key, LockMode::Shared)
        .map_err(BuildError::cache_io("lock acquisition", &lock_path))?;

      if let Some(record) = self.valid_record(key, &record_path)? {
        debug!(digest = %key, artifact = %file_name, "cache hit");
        return Ok(self.published(key, record, shared, false));
      }

      let pinned = self.pinned_record(key);
      if let Some(record) = &pinned {
        if manifest::verify_record(&self.root, key, record) {
          debug!(digest = %key, artifact = %file_name, "cache hit on entry pinned by this process");
          return Ok(self.published(key, record.clone(), shared, false));
        }
      }
      drop(shared);

      match BuildLock::try_acquire(&lock_path, key, LockMode::Exclusive)
        .map_err(BuildError::cache_io("lock acquisition", &lock_path))?
      {
        Some(lock) => break lock,
        None => {
          // Our own shared lock may be the holder, so waiting would never end.
          if let Some(record) = pinned {
            return Err(BuildError::ArtifactChanged {
              path: self.root.join(record.artifact),
            });
          }
          if !reported_wait {
            match lock::read_holder(&lock_path) {
              Some(holder) => debug!(digest = %key, pid = holder.pid, artifact = %holder.artifact, "waiting for in-flight build"),
              None => debug!(digest = %key, "waiting for in-flight build"),
            }
            reported_wait = true;
          }
          thread::sleep(CONTENTION_BACKOFF);
        }
      }
    };

    // Another worker may have published between our lookup and the upgrade.
    if let Some(record) = self.valid_record(key, &record_path)? {
      debug!(digest = %key, artifact = %file_name, "cache hit after acquiring build lock");
      let shared = exclusive
        .downgrade()
        .map_err(BuildError::cache_io("lock downgrade", &lock_path))?;
      return Ok(self.published(key, record, shared, false));
    }

    if let Err(e) = exclusive.write_metadata(file_name) {
      debug!(path = ?lock_path, error = %e, "failed to write lock metadata");
    }

    let out_dir = store::object_dir(&self.root, key);
    if out_dir.exists() {
      debug!(path = ?out_dir, "removing incomplete output from an earlier build");
      fs::remove_dir_all(&out_dir).map_err(BuildError::cache_io("stale output removal", &out_dir))?;
    }
    fs::create_dir_all(&out_dir).map_err(BuildError::cache_io("output directory creation", &out_dir))?;

    info!(digest = %key, artifact = %file_name, "cache miss, building");
    produce(&out_dir)?;

    let path = out_dir.join(file_name);
    let output_hash = key::hash_file(&path).map_err(BuildError::cache_io("artifact hashing", &path))?;
    let sub_path = store::artifact_sub_path(key, file_name);

    let record = ManifestRecord {
      version: manifest::RECORD_VERSION,
      digest: key.0.clone(),
      artifact: sub_path.to_string_lossy().replace('\\', "/"),
      tool_version: self.tool_version.clone(),
      output_hash: output_hash.0,
    };
    if let Err(e) = manifest::write_record(&record_path, &record) {
      warn!(
        artifact = %file_name,
        digest = %key,
        error = %e,
        "failed to write cache manifest; artifact is usable for this run only"
      );
    }

    let lock = exclusive
      .downgrade()
      .map_err(BuildError::cache_io("lock downgrade", &lock_path))?;
    self.pin(key, record);

    info!(digest = %key, path = ?path, "artifact published");

    Ok(Published {
      key: key.clone(),
      sub_path,
      path,
      lock,
      fresh: true,
    })
  }

  fn valid_record(&self, key: &CacheKey, record_path: &Path) -> Result<Option<ManifestRecord>, BuildError> {
    let record = manifest::read_record(record_path).map_err(BuildError::cache_io("manifest read", record_path))?;
    Ok(record.filter(|record| manifest::verify_record(&self.root, key, record)))
  }

  fn pinned_record(&self, key: &CacheKey) -> Option<ManifestRecord> {
    self.pinned.lock().unwrap_or_else(PoisonError::into_inner).get(key).cloned()
  }

  fn pin(&self, key: &CacheKey, record: ManifestRecord) {
    self
      .pinned
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .insert(key.clone(), record);
  }

  fn published(&self, key: &CacheKey, record: ManifestRecord, lock: BuildLock, fresh: bool) -> Published {
    self.pin(key, record.clone());
    let sub_path = PathBuf::from(record.artifact);
    Published {
      key: key.clone(),
      path: self.root.join(&sub_path),
      sub_path,
      lock,
      fresh,
    }
  }
}
