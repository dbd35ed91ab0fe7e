//! Per-install-path mutual exclusion.
//!
//! Two package manager commands writing to the same install location would
//! corrupt it, so every install, update and uninstall takes the lock for
//! its location first. Commands on different locations run concurrently.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Entries beyond this count trigger a sweep of unused locks.
const MAX_LOCK_ENTRIES: usize = 64;

/// Lock table keyed by install location.
#[derive(Debug, Clone, Default)]
pub struct InstallLocks {
    locks: Arc<DashMap<PathBuf, Arc<AsyncMutex<()>>>>,
}

/// Held for the duration of one command on a location.
#[derive(Debug)]
pub struct InstallGuard {
    path: PathBuf,
    _guard: OwnedMutexGuard<()>,
}

impl InstallGuard {
    /// The normalized location the lock is keyed on.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl InstallLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for and take the lock for `path`.
    pub async fn acquire(&self, path: &Path) -> InstallGuard {
        let key = lock_key(path);
        let lock = self.lock_for(&key);

        if lock.try_lock().is_err() {
            tracing::info!("Waiting for another command on {:?} to finish", key);
        }

        InstallGuard {
            _guard: lock.lock_owned().await,
            path: key,
        }
    }

    /// Take the lock only if it is free.
    pub fn try_acquire(&self, path: &Path) -> Option<InstallGuard> {
        let key = lock_key(path);
        let guard = self.lock_for(&key).try_lock_owned().ok()?;
        Some(InstallGuard {
            _guard: guard,
            path: key,
        })
    }

    /// Number of tracked locations.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    fn lock_for(&self, key: &Path) -> Arc<AsyncMutex<()>> {
        if self.locks.len() >= MAX_LOCK_ENTRIES {
            // Only the table holds a reference: nobody is using the lock.
            self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }

        self.locks
            .entry(key.to_path_buf())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }
}

/// Resolve symlinks so every spelling of a location shares one lock. A
/// location that does not exist yet keys on its canonical parent, which is
/// what it canonicalizes to once created.
fn lock_key(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }

    match (path.parent(), path.file_name()) {
        (Some(parent), Some(name)) => match parent.canonicalize() {
            Ok(parent) => parent.join(name),
            Err(_) => path.to_path_buf(),
        },
        _ => path.to_path_buf(),
    }
}
