//! Session-wide registry of finished artifacts.
//!
//! Maps an artifact name (`crt2.o`, `kernel32.lib`, ...) to its resolved path
//! and the [`BuildLock`] that keeps the cache entry pinned for the session.
//! Entries are inserted once and never updated or removed until teardown.
//!
//! The map mutex is only held for map operations. Builds run outside it; a
//! name being built is marked in-flight so a second requester waits on the
//! condvar instead of starting a duplicate build.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use tracing::{debug, error};

use crate::cache::BuildLock;
use crate::error::BuildError;

/// A published artifact.
#[derive(Debug)]
pub struct RegistryEntry {
  pub path: PathBuf,
  pub lock: Option<BuildLock>,
}

#[derive(Debug)]
enum Slot {
  InFlight,
  Ready(RegistryEntry),
}

/// Outcome of [`ArtifactRegistry::claim`].
#[derive(Debug)]
pub enum Claim<'a> {
  /// The artifact is already published.
  Ready(PathBuf),
  /// The caller must build the artifact and publish it through the guard.
  Owned(ClaimGuard<'a>),
}

#[derive(Debug, Default)]
pub struct ArtifactRegistry {
  slots: Mutex<HashMap<String, Slot>>,
  changed: Condvar,
}

impl ArtifactRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  fn slots(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
    // The map is only mutated through single insert/remove calls, so a
    // poisoned guard still holds a consistent map.
    self.slots.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Insert a finished artifact. Fails if `name` is already published or in
  /// flight.
  pub fn publish(&self, name: &str, path: PathBuf, lock: Option<BuildLock>) -> Result<(), BuildError> {
    let mut slots = self.slots();
    if slots.contains_key(name) {
      error!(name = %name, "artifact registered twice");
      return Err(BuildError::DuplicateRegistration { name: name.to_string() });
    }
    debug!(name = %name, path = ?path, "artifact registered");
    slots.insert(name.to_string(), Slot::Ready(RegistryEntry { path, lock }));
    Ok(())
  }

  /// Path of a published artifact. In-flight names are reported as absent.
  pub fn lookup(&self, name: &str) -> Option<PathBuf> {
    match self.slots().get(name) {
      Some(Slot::Ready(entry)) => Some(entry.path.clone()),
      _ => None,
    }
  }

  /// Reserve `name` for building, or wait for whoever already reserved it.
  ///
  /// If the current owner drops its guard without publishing, one waiter
  /// becomes the new owner.
  pub fn claim(&self, name: &str) -> Claim<'_> {
    let mut slots = self.slots();
    loop {
      match slots.get(name) {
        Some(Slot::Ready(entry)) => return Claim::Ready(entry.path.clone()),
        Some(Slot::InFlight) => {
          debug!(name = %name, "waiting for in-flight artifact");
          slots = self.changed.wait(slots).unwrap_or_else(PoisonError::into_inner);
        }
        None => {
          slots.insert(name.to_string(), Slot::InFlight);
          return Claim::Owned(ClaimGuard {
            registry: self,
            name: name.to_string(),
            published: false,
          });
        }
      }
    }
  }

  pub fn len(&self) -> usize {
    self
      .slots()
      .values()
      .filter(|slot| matches!(slot, Slot::Ready(_)))
      .count()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Drop every published entry, releasing their locks. Returns how many
  /// entries were released.
  pub fn release_all(&self) -> usize {
    let drained: Vec<Slot> = self.slots().drain().map(|(_, slot)| slot).collect();
    let released = drained.iter().filter(|slot| matches!(slot, Slot::Ready(_))).count();
    drop(drained);
    self.changed.notify_all();
    released
  }
}

/// Exclusive right to build and publish one artifact name.
#[derive(Debug)]
pub struct ClaimGuard<'a> {
  registry: &'a ArtifactRegistry,
  name: String,
  published: bool,
}

impl ClaimGuard<'_> {
  pub fn name(&self) -> &str {
    &self.name
  }

  /// Complete the claim, transferring `lock` into the registry.
  pub fn publish(mut self, path: PathBuf, lock: Option<BuildLock>) -> PathBuf {
    {
      let mut slots = self.registry.slots();
      debug!(name = %self.name, path = ?path, "artifact registered");
      slots.insert(self.name.clone(), Slot::Ready(RegistryEntry { path: path.clone(), lock }));
    }
    self.published = true;
    self.registry.changed.notify_all();
    path
  }
}

impl Drop for ClaimGuard<'_> {
  fn drop(&mut self) {
    if self.published {
      return;
    }
    {
      let mut slots = self.registry.slots();
      if matches!(slots.get(&self.name), Some(Slot::InFlight)) {
        slots.remove(&self.name);
      }
    }
    self.registry.changed.notify_all();
  }
}
