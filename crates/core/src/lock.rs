//! In-process advisory locks keyed by resource path.
//!
//! Every read-modify-write sequence on a shared file (the tree document,
//! a content blob) acquires the lock for that path before touching disk.
//! Acquisition is scoped: the guard releases on drop, so the lock is freed
//! on every exit path, including validation failures and I/O errors.
//!
//! A writer that cannot acquire the lock within the bounded wait fails
//! with a retryable [`LockError::Timeout`] rather than blocking forever.

use crate::error::LockError;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, trace};

/// Registry of per-path advisory locks.
///
/// One slot is lazily created per distinct path; two writers targeting the
/// same path serialize through the same slot.
#[derive(Default)]
pub struct PathLocks {
    slots: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl PathLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `path`, waiting at most `wait`.
    ///
    /// `owner` is an advisory label recorded on the guard and reported in
    /// timeout errors; it carries no enforcement semantics.
    pub async fn acquire(
        &self,
        path: &Path,
        owner: &str,
        wait: Duration,
    ) -> Result<PathLockGuard, LockError> {
        let slot = {
            let mut slots = self.slots.lock().await;
            slots
                .entry(path.to_path_buf())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        match tokio::time::timeout(wait, slot.lock_owned()).await {
            Ok(guard) => {
                debug!(path = %path.display(), owner, "Acquired path lock");
                Ok(PathLockGuard {
                    path: path.to_path_buf(),
                    owner: owner.to_string(),
                    acquired_at: Utc::now(),
                    _guard: guard,
                })
            }
            Err(_) => Err(LockError::Timeout {
                path: path.display().to_string(),
                owner: owner.to_string(),
                waited_ms: wait.as_millis() as u64,
            }),
        }
    }
}

/// A held advisory lock. Dropping the guard releases the lock.
#[derive(Debug)]
pub struct PathLockGuard {
    path: PathBuf,
    owner: String,
    acquired_at: DateTime<Utc>,
    _guard: OwnedMutexGuard<()>,
}

impl PathLockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn acquired_at(&self) -> DateTime<Utc> {
        self.acquired_at
    }
}

impl Drop for PathLockGuard {
    fn drop(&mut self) {
        trace!(path = %self.path.display(), owner = %self.owner, "Released path lock");
    }
}
