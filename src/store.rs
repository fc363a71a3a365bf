//! Subscriber registry with durable JSON persistence.
//!
//! The registry is the only state shared between the poll loop and the
//! command handler. Every access to the underlying map goes through a single
//! mutex; `persist` keeps that mutex held while the record is written so a
//! concurrent subscribe or unsubscribe cannot interleave with the write.

use crate::core::SubscriberId;
use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors raised while reading or writing the durable subscriber record.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on subscriber record {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to encode subscriber record: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to decode subscriber record {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// On-disk shape: decimal chat id -> presence flag.
type Record = BTreeMap<i64, bool>;

/// A thread-safe, optionally file-backed set of subscribers.
///
/// Cloning is cheap and yields a handle onto the same registry.
#[derive(Debug, Clone)]
pub struct SubscriberStore {
    inner: Arc<Mutex<Record>>,
    path: Option<PathBuf>,
}

impl SubscriberStore {
    /// Creates an empty store that is never written to disk.
    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Record::new())),
            path: None,
        }
    }

    /// Creates an empty store backed by the record at `path`.
    ///
    /// Nothing is read until [`SubscriberStore::load`] is called.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Record::new())),
            path: Some(path.into()),
        }
    }

    /// Creates a store backed by `path` and merges the existing record into it.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let store = Self::with_path(path);
        store.load();
        store
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> MutexGuard<'_, Record> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Marks `id` as subscribed. Adding an existing subscriber is a no-op.
    pub fn add(&self, id: SubscriberId) {
        self.lock().insert(id.as_i64(), true);
    }

    /// Removes `id` if present.
    pub fn remove(&self, id: SubscriberId) {
        self.lock().remove(&id.as_i64());
    }

    pub fn contains(&self, id: SubscriberId) -> bool {
        self.lock().contains_key(&id.as_i64())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Returns a point-in-time copy of the subscriber ids.
    ///
    /// The lock is released before this returns, so callers may iterate the
    /// result while the registry keeps changing underneath.
    pub fn snapshot(&self) -> HashSet<SubscriberId> {
        self.lock().keys().copied().map(SubscriberId).collect()
    }

    /// Writes the registry to its backing record, logging any failure.
    pub fn persist(&self) {
        if let Err(e) = self.try_persist() {
            warn!(error = %e, "Failed to persist subscribers");
        }
    }

    /// Writes the registry to its backing record.
    ///
    /// The record is written to a sibling temporary file and renamed into
    /// place, so readers never observe a partially written file.
    pub fn try_persist(&self) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            debug!("Subscriber store is in-memory only; skipping persist");
            return Ok(());
        };

        let inner = self.lock();
        let bytes = serde_json::to_vec(&*inner).map_err(StoreError::Encode)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let tmp = tmp_path(path);
        std::fs::write(&tmp, &bytes).map_err(|source| StoreError::Io {
            path: tmp.clone(),
            source,
        })?;
        if let Err(source) = std::fs::rename(&tmp, path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(StoreError::Io {
                path: path.clone(),
                source,
            });
        }

        debug!(path = %path.display(), subscribers = inner.len(), "Persisted subscribers");
        Ok(())
    }

    /// Merges the backing record into the registry, logging any failure.
    ///
    /// A missing record is the normal first-run state and is not reported.
    pub fn load(&self) {
        match self.try_load() {
            Ok(0) => {}
            Ok(count) => info!(count, "Loaded subscribers from disk"),
            Err(e) => warn!(error = %e, "Failed to load subscribers; keeping current state"),
        }
    }

    /// Merges the backing record into the registry.
    ///
    /// Returns the number of entries read. A missing record yields `Ok(0)`.
    /// On a decode error the registry is left untouched.
    pub fn try_load(&self) -> Result<usize, StoreError> {
        let Some(path) = &self.path else {
            return Ok(0);
        };

        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No subscriber record yet; starting empty");
                return Ok(0);
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.clone(),
                    source,
                })
            }
        };

        let loaded: Record =
            serde_json::from_slice(&bytes).map_err(|source| StoreError::Decode {
                path: path.clone(),
                source,
            })?;

        let count = loaded.len();
        self.lock().extend(loaded);
        Ok(count)
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
