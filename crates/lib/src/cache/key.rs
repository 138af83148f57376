//! Cache key derivation and content hashing.
//!
//! - `CacheKey`: truncated digest naming a cache entry (`o/<key>/`, `h/<key>.json`)
//! - `KeyHasher`: accumulates the build-relevant inputs of one artifact
//! - `ContentHash`: full SHA-256 of an artifact's bytes, for re-validation

use std::fs;
use std::io::{self, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::consts::DIGEST_HEX_LEN;

/// Digest of every build-relevant input of one artifact.
///
/// Lowercase hex, [`DIGEST_HEX_LEN`] characters. Two requests with the same
/// key are treated as producing identical output.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CacheKey(pub String);

impl CacheKey {
  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl std::fmt::Display for CacheKey {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Full 64-character SHA-256 of file content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl std::fmt::Display for ContentHash {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// Incremental builder for a [`CacheKey`].
///
/// Every field is length-prefixed, so `("ab", "c")` and `("a", "bc")` hash
/// differently. Only what is explicitly added influences the key.
#[derive(Clone, Default)]
pub struct KeyHasher {
  hasher: Sha256,
}

impl KeyHasher {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn add_bytes(&mut self, bytes: &[u8]) -> &mut Self {
    self.hasher.update((bytes.len() as u64).to_le_bytes());
    self.hasher.update(bytes);
    self
  }

  pub fn add_str(&mut self, value: &str) -> &mut Self {
    self.add_bytes(value.as_bytes())
  }

  /// Mix in the full content of a file.
  pub fn add_file(&mut self, path: &Path) -> io::Result<&mut Self> {
    let content = fs::read(path)?;
    Ok(self.add_bytes(&content))
  }

  pub fn finish(self) -> CacheKey {
    let full = hex::encode(self.hasher.finalize());
    CacheKey(full[..DIGEST_HEX_LEN].to_string())
  }
}

/// Hash a file's contents.
///
/// Returns the full 64-character SHA256 hash of the file.
pub fn hash_file(path: &Path) -> io::Result<ContentHash> {
  let mut file = fs::File::open(path)?;

  let mut hasher = Sha256::new();
  let mut buffer = [0u8; 8192];

  loop {
    let bytes_read = file.read(&mut buffer)?;
    if bytes_read == 0 {
      break;
    }
    hasher.update(&buffer[..bytes_read]);
  }

  Ok(ContentHash(hex::encode(hasher.finalize())))
}
