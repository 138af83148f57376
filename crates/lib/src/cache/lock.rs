//! Per-digest file locks.
//!
//! Each cache entry has a lock file at `<cache>/h/<digest>.lock`. A builder
//! holds it exclusively while producing the artifact, then downgrades to a
//! shared lock that travels into the artifact registry. Locks are OS file
//! locks on a freshly opened handle, so they exclude other processes and other
//! threads of this process alike.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::cache::key::CacheKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
  Shared,
  Exclusive,
}

/// Diagnostic record written into the lock file by the exclusive holder.
#[derive(Debug, Serialize, Deserialize)]
pub struct LockMetadata {
  pub version: u32,
  pub pid: u32,
  pub started_at_unix: u64,
  pub digest: String,
  pub artifact: String,
}

/// Exclusive (or, once published, shared) right over one cache entry.
///
/// Move-only: ownership can be handed to the registry but never duplicated.
/// Dropping the handle closes the file and releases the lock.
#[derive(Debug)]
pub struct BuildLock {
  file: File,
  lock_path: PathBuf,
  digest: CacheKey,
  mode: LockMode,
}

impl BuildLock {
  /// Block until the lock is held in `mode`.
  pub(crate) fn acquire(lock_path: &Path, digest: &CacheKey, mode: LockMode) -> io::Result<Self> {
    let file = open_lock_file(lock_path)?;
    lock(&file, mode)?;
    Ok(Self {
      file,
      lock_path: lock_path.to_path_buf(),
      digest: digest.clone(),
      mode,
    })
  }

  /// Take the lock in `mode` if nobody else holds a conflicting lock.
  pub(crate) fn try_acquire(lock_path: &Path, digest: &CacheKey, mode: LockMode) -> io::Result<Option<Self>> {
    let file = open_lock_file(lock_path)?;
    match try_lock(&file, mode) {
      Ok(()) => Ok(Some(Self {
        file,
        lock_path: lock_path.to_path_buf(),
        digest: digest.clone(),
        mode,
      })),
      Err(err) if err.kind() == io::ErrorKind::WouldBlock => Ok(None),
      Err(err) => Err(err),
    }
  }

  /// Convert an exclusive lock into a shared one.
  pub(crate) fn downgrade(mut self) -> io::Result<Self> {
    if self.mode == LockMode::Shared {
      return Ok(self);
    }
    downgrade(&self.file)?;
    self.mode = LockMode::Shared;
    Ok(self)
  }

  pub(crate) fn write_metadata(&self, artifact: &str) -> io::Result<()> {
    let metadata = LockMetadata {
      version: 1,
      pid: std::process::id(),
      started_at_unix: SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs(),
      digest: self.digest.0.clone(),
      artifact: artifact.to_string(),
    };

    self.file.set_len(0)?;
    let mut file = &self.file;
    file.seek(SeekFrom::Start(0))?;
    let mut writer = io::BufWriter::new(file);
    serde_json::to_writer(&mut writer, &metadata).map_err(io::Error::other)?;
    writer.flush()
  }

  pub fn mode(&self) -> LockMode {
    self.mode
  }

  pub fn lock_path(&self) -> &Path {
    &self.lock_path
  }
}

/// Best-effort read of whoever last held the lock exclusively.
pub(crate) fn read_holder(lock_path: &Path) -> Option<LockMetadata> {
  let mut file = File::open(lock_path).ok()?;
  let mut contents = String::new();
  file.read_to_string(&mut contents).ok()?;
  serde_json::from_str(&contents).ok()
}

fn open_lock_file(lock_path: &Path) -> io::Result<File> {
  OpenOptions::new()
    .read(true)
    .write(true)
    .create(true)
    .truncate(false)
    .open(lock_path)
}

#[cfg(unix)]
fn flock_retrying(file: &File, operation: rustix::fs::FlockOperation) -> io::Result<()> {
  use rustix::io::Errno;
  use std::os::unix::io::AsFd;

  loop {
    match rustix::fs::flock(file.as_fd(), operation) {
      Ok(()) => return Ok(()),
      Err(e) if e == Errno::INTR => continue,
      Err(e) => return Err(io::Error::from_raw_os_error(e.raw_os_error())),
    }
  }
}

#[cfg(unix)]
fn lock(file: &File, mode: LockMode) -> io::Result<()> {
  use rustix::fs::FlockOperation;

  let operation = match mode {
    LockMode::Shared => FlockOperation::LockShared,
    LockMode::Exclusive => FlockOperation::LockExclusive,
  };
  flock_retrying(file, operation)
}

#[cfg(unix)]
fn try_lock(file: &File, mode: LockMode) -> io::Result<()> {
  use rustix::fs::FlockOperation;

  let operation = match mode {
    LockMode::Shared => FlockOperation::NonBlockingLockShared,
    LockMode::Exclusive => FlockOperation::NonBlockingLockExclusive,
  };
  flock_retrying(file, operation)
}

#[cfg(unix)]
fn downgrade(file: &File) -> io::Result<()> {
  flock_retrying(file, rustix::fs::FlockOperation::LockShared)
}

#[cfg(windows)]
fn lock_file_ex(file: &File, mode: LockMode, fail_immediately: bool) -> io::Result<()> {
  use std::os::windows::io::AsRawHandle;
  use windows_sys::Win32::Foundation::HANDLE;
  use windows_sys::Win32::Storage::FileSystem::{LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY, LockFileEx};

  let handle = file.as_raw_handle() as HANDLE;
  let mut flags = match mode {
    LockMode::Shared => 0,
    LockMode::Exclusive => LOCKFILE_EXCLUSIVE_LOCK,
  };
  if fail_immediately {
    flags |= LOCKFILE_FAIL_IMMEDIATELY;
  }

  // SAFETY: OVERLAPPED is a plain data struct that is valid when zero-initialized.
  // LockFileEx is safe to call with a valid file handle and zeroed OVERLAPPED.
  let result = unsafe {
    let mut overlapped = std::mem::zeroed();
    LockFileEx(handle, flags, 0, 1, 0, &mut overlapped)
  };

  if result != 0 {
    return Ok(());
  }

  let err = io::Error::last_os_error();
  // ERROR_LOCK_VIOLATION
  if err.raw_os_error() == Some(33) {
    return Err(io::Error::new(io::ErrorKind::WouldBlock, err));
  }
  Err(err)
}

#[cfg(windows)]
fn lock(file: &File, mode: LockMode) -> io::Result<()> {
  lock_file_ex(file, mode, false)
}

#[cfg(windows)]
fn try_lock(file: &File, mode: LockMode) -> io::Result<()> {
  lock_file_ex(file, mode, true)
}

#[cfg(windows)]
fn downgrade(file: &File) -> io::Result<()> {
  use std::os::windows::io::AsRawHandle;
  use windows_sys::Win32::Foundation::HANDLE;
  use windows_sys::Win32::Storage::FileSystem::UnlockFile;

  let handle = file.as_raw_handle() as HANDLE;
  // SAFETY: the handle is valid for the lifetime of `file` and the range
  // matches the one locked by `lock_file_ex`.
  if unsafe { UnlockFile(handle, 0, 0, 1, 0) } == 0 {
    return Err(io::Error::last_os_error());
  }
  lock_file_ex(file, LockMode::Shared, false)
}
