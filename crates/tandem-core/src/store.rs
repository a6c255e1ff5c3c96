//! Versioned JSON documents shared between processes.
//!
//! Every coordination document (registry, leases, audit log) is a single JSON
//! file that is read in full, changed in memory and written back in full. To
//! keep concurrent writers from losing each other's updates:
//!
//! - mutations run under an exclusive advisory lock on `<document>.lock`,
//!   acquired with exponential backoff
//! - each document carries a `version` counter; a transaction that observes a
//!   version different from the one it started with is retried
//! - writes go to a temp file in the same directory and are renamed into place
//! - a transaction that changed nothing never touches the file

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]

use std::{
    fs::{File, OpenOptions},
    io::Write,
    marker::PhantomData,
    path::{Path, PathBuf},
    time::Duration,
};

use fs2::FileExt;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{Error, Result};

/// How many times a transaction is replayed after observing a stale version.
const MAX_STALE_RETRIES: u32 = 5;

/// Lock acquisition behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockOptions {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Base delay in milliseconds for exponential backoff
    pub base_delay_ms: u64,
    /// Maximum delay in milliseconds
    pub max_delay_ms: u64,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            max_retries: 10,
            base_delay_ms: 10,
            max_delay_ms: 2000,
        }
    }
}

impl LockOptions {
    fn delay(&self, attempt: u32) -> Duration {
        let factor = 2_u64.saturating_pow(attempt);
        Duration::from_millis(
            self.base_delay_ms
                .saturating_mul(factor)
                .min(self.max_delay_ms),
        )
    }
}

/// Outcome of a transaction closure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation<R> {
    /// Nothing changed; the document is not rewritten.
    Unchanged(R),
    /// The document changed and must be committed.
    Changed(R),
}

impl<R> Mutation<R> {
    pub const fn changed_if(changed: bool, value: R) -> Self {
        if changed {
            Self::Changed(value)
        } else {
            Self::Unchanged(value)
        }
    }
}

#[derive(Serialize, Deserialize)]
struct Versioned<T> {
    #[serde(default)]
    version: u64,
    #[serde(flatten)]
    data: T,
}

#[derive(Deserialize)]
struct VersionOnly {
    #[serde(default)]
    version: u64,
}

/// Held exclusive lock on a document; released on drop.
#[derive(Debug)]
struct DocumentLock {
    file: File,
    path: PathBuf,
}

impl Drop for DocumentLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!("Failed to release lock {}: {e}", self.path.display());
        } else {
            tracing::debug!("Released document lock: {}", self.path.display());
        }
    }
}

/// A JSON document of type `T` stored at a fixed path.
#[derive(Debug, Clone)]
pub struct JsonDocument<T> {
    path: PathBuf,
    lock: LockOptions,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonDocument<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    pub fn new(path: impl Into<PathBuf>, lock: LockOptions) -> Self {
        Self {
            path: path.into(),
            lock,
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read a snapshot of the document without locking.
    ///
    /// A missing or empty file yields `T::default()`.
    pub fn load(&self) -> Result<T> {
        self.read_versioned().map(|(data, _)| data)
    }

    /// Current on-disk version (0 for a missing document).
    pub fn version(&self) -> Result<u64> {
        self.read_versioned().map(|(_, version)| version)
    }

    /// Run a read-modify-write transaction under the document lock.
    ///
    /// The closure may run more than once if another writer slipped in between
    /// the read and the commit; it must therefore be free of side effects other
    /// than mutating the document it is given.
    pub fn transact<R>(&self, mut f: impl FnMut(&mut T) -> Result<Mutation<R>>) -> Result<R> {
        self.ensure_parent()?;

        for attempt in 0..=MAX_STALE_RETRIES {
            let _lock = self.acquire_lock()?;
            let (mut data, observed) = self.read_versioned()?;

            match f(&mut data)? {
                Mutation::Unchanged(value) => return Ok(value),
                Mutation::Changed(value) => {
                    let current = self.read_version_only()?;
                    if current != observed {
                        tracing::debug!(
                            "Stale write to {} (observed v{observed}, found v{current}), retry {}",
                            self.path.display(),
                            attempt + 1
                        );
                        continue;
                    }
                    self.write_atomic(observed + 1, data)?;
                    return Ok(value);
                }
            }
        }

        Err(Error::io_error(format!(
            "{} kept changing underneath us; gave up after {} attempts",
            self.path.display(),
            MAX_STALE_RETRIES + 1
        )))
    }

    fn ensure_parent(&self) -> Result<()> {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                std::fs::create_dir_all(parent).map_err(|e| {
                    Error::io_error(format!(
                        "Failed to create state directory {}: {e}",
                        parent.display()
                    ))
                })
            }
            _ => Ok(()),
        }
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(std::ffi::OsStr::to_os_string)
            .unwrap_or_default();
        name.push(".lock");
        self.path.with_file_name(name)
    }

    fn acquire_lock(&self) -> Result<DocumentLock> {
        let lock_path = self.lock_path();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| {
                Error::io_error(format!(
                    "Failed to open lock file '{}': {e}",
                    lock_path.display()
                ))
            })?;

        let mut attempt = 0;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    tracing::debug!("Acquired document lock: {}", lock_path.display());
                    return Ok(DocumentLock {
                        file,
                        path: lock_path,
                    });
                }
                Err(e) if attempt >= self.lock.max_retries => {
                    return Err(Error::io_error(format!(
                        "Failed to acquire lock '{}' after {} attempts: {e}",
                        lock_path.display(),
                        self.lock.max_retries + 1
                    )));
                }
                Err(_) => {
                    let delay = self.lock.delay(attempt);
                    tracing::debug!(
                        "Lock attempt {}/{} failed, retrying after {}ms: {}",
                        attempt + 1,
                        self.lock.max_retries + 1,
                        delay.as_millis(),
                        lock_path.display()
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
            }
        }
    }

    fn read_raw(&self) -> Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(None),
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::io_error(format!(
                "Failed to read {}: {e}",
                self.path.display()
            ))),
        }
    }

    fn read_versioned(&self) -> Result<(T, u64)> {
        match self.read_raw()? {
            None => Ok((T::default(), 0)),
            Some(content) => serde_json::from_str::<Versioned<T>>(&content)
                .map(|doc| (doc.data, doc.version))
                .map_err(|e| {
                    Error::parse_error(format!("Corrupt document {}: {e}", self.path.display()))
                }),
        }
    }

    fn read_version_only(&self) -> Result<u64> {
        match self.read_raw()? {
            None => Ok(0),
            Some(content) => serde_json::from_str::<VersionOnly>(&content)
                .map(|doc| doc.version)
                .map_err(|e| {
                    Error::parse_error(format!("Corrupt document {}: {e}", self.path.display()))
                }),
        }
    }

    fn write_atomic(&self, version: u64, data: T) -> Result<()> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let content = serde_json::to_string_pretty(&Versioned { version, data })?;

        let mut temp = tempfile::NamedTempFile::new_in(dir)
            .map_err(|e| Error::io_error(format!("Failed to create temp file: {e}")))?;
        temp.write_all(content.as_bytes())?;
        temp.write_all(b"\n")?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| {
            Error::io_error(format!(
                "Failed to replace {}: {}",
                self.path.display(),
                e.error
            ))
        })?;

        tracing::debug!("Wrote {} (v{version})", self.path.display());
        Ok(())
    }
}
