//! Store: cached, lock-coordinated JSON collection files.
//!
//! Provides the collection primitives every higher-level operation is built
//! on: [`Store::read`], [`Store::write`] and the read-modify-write
//! [`Store::update`]. Commits write a temporary sibling file, fsync it and
//! rename it over the target, so a crash mid-write never leaves a
//! half-written collection visible.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use checkin_core::{CheckinConfig, LimitsConfig};
use chrono::{DateTime, Utc};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::cache::{CacheStats, SnapshotCache};
use crate::clock::{Clock, SystemClock};
use crate::collection::{CollectionId, Document, EVENTS_DIR, Scope};
use crate::error::{StoreError, StoreResult, io_err};
use crate::locks::LockTable;

/// Prefix of scope directories that have been unlinked from the index but
/// not yet removed from disk.
pub(crate) const TRASH_PREFIX: &str = ".trash-";

/// Thread-safe document store rooted at a data directory.
#[derive(Clone)]
pub struct Store {
    inner: Arc<Inner>,
}

struct Inner {
    root: PathBuf,
    cache: SnapshotCache,
    locks: LockTable,
    clock: Arc<dyn Clock>,
    limits: LimitsConfig,
    pretty: bool,
}

impl Store {
    /// Open (or create) a store using the given configuration.
    pub fn open(config: &CheckinConfig) -> StoreResult<Self> {
        Self::open_with_clock(config, Arc::new(SystemClock))
    }

    /// Open a store that takes its timestamps from `clock`.
    pub fn open_with_clock(config: &CheckinConfig, clock: Arc<dyn Clock>) -> StoreResult<Self> {
        if config.storage.lock_timeout_ms == 0 {
            return Err(StoreError::Invalid(
                "lock timeout must be greater than zero".to_string(),
            ));
        }
        let root = config.storage.data_dir.clone();
        let events = root.join(EVENTS_DIR);
        fs::create_dir_all(&events).map_err(io_err!(events))?;

        let store = Self {
            inner: Arc::new(Inner {
                root,
                cache: SnapshotCache::new(),
                locks: LockTable::new(config.storage.lock_timeout()),
                clock,
                limits: config.limits.clone(),
                pretty: config.storage.pretty,
            }),
        };
        store.purge_trash();
        debug!(root = ?store.inner.root, "store opened");
        Ok(store)
    }

    /// Open a store at `data_dir` with default settings.
    pub fn open_dir(data_dir: &Path) -> StoreResult<Self> {
        let mut config = CheckinConfig::default();
        config.storage.data_dir = data_dir.to_path_buf();
        Self::open(&config)
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    pub fn limits(&self) -> &LimitsConfig {
        &self.inner.limits
    }

    pub fn lock_timeout(&self) -> Duration {
        self.inner.locks.timeout()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.inner.clock.now()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.inner.cache.stats()
    }

    /// Drop one cached collection; the next read goes to disk.
    pub fn invalidate(&self, id: &CollectionId) {
        self.inner.cache.evict(id);
    }

    /// Drop every cached collection.
    pub fn invalidate_all(&self) {
        self.inner.cache.clear();
    }

    // ── Collection primitives ──────────────────────────────────────

    /// Current contents of the `D` collection in `scope`.
    ///
    /// Served from the cache when possible, otherwise decoded from disk and
    /// cached. A collection that was never written reads as
    /// `D::default()`. Never waits on a write lock.
    pub fn read<D: Document>(&self, scope: &Scope) -> StoreResult<Arc<D>> {
        let id = CollectionId::new(scope.clone(), D::KIND);
        let path = self.path_for(&id)?;
        self.read_at(&id, &path)
    }

    fn read_at<D: Document>(&self, id: &CollectionId, path: &Path) -> StoreResult<Arc<D>> {
        if let Some(hit) = self.inner.cache.get::<D>(id) {
            return Ok(hit);
        }
        match load::<D>(path)? {
            Some(doc) => Ok(self.inner.cache.fill(id, Arc::new(doc), || path.exists())),
            None => Ok(Arc::new(D::default())),
        }
    }

    /// Replace the `D` collection in `scope` with `doc`.
    pub fn write<D: Document>(&self, scope: &Scope, doc: D) -> StoreResult<Arc<D>> {
        let id = CollectionId::new(scope.clone(), D::KIND);
        let path = self.path_for(&id)?;
        self.inner
            .locks
            .with_lock(&id, || self.commit(&id, &path, doc))
    }

    /// Read-modify-write of the `D` collection in `scope`.
    ///
    /// Under the collection's write lock: takes the current snapshot,
    /// applies `f` to a private copy and commits the copy if it differs.
    /// If `f` fails nothing is written and the error is returned as is.
    pub fn update<D, R>(&self, scope: &Scope, f: impl FnOnce(&mut D) -> StoreResult<R>) -> StoreResult<R>
    where
        D: Document,
    {
        let id = CollectionId::new(scope.clone(), D::KIND);
        let path = self.path_for(&id)?;
        self.inner.locks.with_lock(&id, || {
            let current = self.read_at::<D>(&id, &path)?;
            let mut next = (*current).clone();
            let out = f(&mut next)?;
            if next != *current {
                self.commit(&id, &path, next)?;
            } else {
                debug!(collection = %id, "update left collection unchanged");
            }
            Ok(out)
        })
    }

    /// Encode, write a temporary sibling, rename it into place, then publish
    /// the new snapshot. Caller holds the write lock for `id`.
    fn commit<D: Document>(&self, id: &CollectionId, path: &Path, doc: D) -> StoreResult<Arc<D>> {
        let dir = path
            .parent()
            .ok_or_else(|| StoreError::Invalid(format!("no parent directory for {id}")))?;
        if !dir.is_dir() {
            return match id.scope() {
                Scope::Event(event_id) => Err(StoreError::not_found("event", event_id.clone())),
                Scope::Global => Err(StoreError::Io {
                    path: dir.to_path_buf(),
                    source: std::io::Error::from(std::io::ErrorKind::NotFound),
                }),
            };
        }

        let bytes = if self.inner.pretty {
            serde_json::to_vec_pretty(&doc)
        } else {
            serde_json::to_vec(&doc)
        }
        .map_err(|e| StoreError::Serialize(e.to_string()))?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(io_err!(dir))?;
        tmp.write_all(&bytes).map_err(io_err!(tmp.path()))?;
        tmp.as_file().sync_all().map_err(io_err!(tmp.path()))?;
        tmp.persist(path).map_err(|e| StoreError::Io {
            path: path.to_path_buf(),
            source: e.error,
        })?;

        let committed = Arc::new(doc);
        self.inner.cache.publish(id, committed.clone());
        debug!(collection = %id, bytes = bytes.len(), "collection committed");
        Ok(committed)
    }

    // ── Scope directories ──────────────────────────────────────────

    pub(crate) fn path_for(&self, id: &CollectionId) -> StoreResult<PathBuf> {
        Ok(self.inner.root.join(id.relative_path()?))
    }

    pub(crate) fn events_dir(&self) -> PathBuf {
        self.inner.root.join(EVENTS_DIR)
    }

    pub(crate) fn scope_dir(&self, event_id: &str) -> StoreResult<PathBuf> {
        let event_path = self.path_for(&CollectionId::for_event(
            event_id,
            crate::collection::CollectionKind::Event,
        ))?;
        Ok(event_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.events_dir().join(event_id)))
    }

    /// Create the directory for a new scope. Fails with `Conflict` if the
    /// directory already exists.
    pub(crate) fn create_scope_dir(&self, event_id: &str) -> StoreResult<PathBuf> {
        let dir = self.scope_dir(event_id)?;
        match fs::create_dir(&dir) {
            Ok(()) => Ok(dir),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Err(StoreError::Conflict(
                format!("event scope {event_id} already exists"),
            )),
            Err(e) => Err(StoreError::Io { path: dir, source: e }),
        }
    }

    /// Unlink a scope from the index and drop its cache entries.
    ///
    /// Holds the write locks of all four collections, renames the scope
    /// directory out of the index and evicts the cache entries in one step
    /// under the cache lock, then removes the renamed directory. Returns
    /// `false` if the scope directory did not exist.
    pub(crate) fn remove_scope(&self, event_id: &str) -> StoreResult<bool> {
        let dir = self.scope_dir(event_id)?;
        let ids = CollectionId::event_scope(event_id);
        let trash = self
            .events_dir()
            .join(format!("{TRASH_PREFIX}{event_id}-{}", uuid::Uuid::new_v4().simple()));

        let removed = self.inner.locks.with_all(&ids, || {
            if !dir.is_dir() {
                return Ok(false);
            }
            self.inner
                .cache
                .evict_with(&ids, || fs::rename(&dir, &trash))
                .map_err(io_err!(dir))?;
            Ok(true)
        })?;
        if !removed {
            return Ok(false);
        }
        self.inner.locks.forget(&ids);

        if let Err(e) = fs::remove_dir_all(&trash) {
            // The scope is already gone from the index; leftovers are
            // purged on the next open.
            warn!(path = ?trash, error = %e, "failed to remove deleted scope directory");
        }
        info!(event_id, "event scope removed");
        Ok(true)
    }

    /// Best-effort cleanup after a failed scope creation.
    pub(crate) fn discard_scope_dir(&self, event_id: &str) {
        let ids = CollectionId::event_scope(event_id);
        for id in &ids {
            self.inner.cache.evict(id);
        }
        self.inner.locks.forget(&ids);
        if let Ok(dir) = self.scope_dir(event_id) {
            if let Err(e) = fs::remove_dir_all(&dir) {
                warn!(path = ?dir, error = %e, "failed to discard partial scope");
            }
        }
    }

    /// Ids of every directory under `events/` that is not trash.
    pub(crate) fn scope_ids(&self) -> StoreResult<Vec<String>> {
        let dir = self.events_dir();
        let mut ids = Vec::new();
        for entry in fs::read_dir(&dir).map_err(io_err!(dir))? {
            let entry = entry.map_err(io_err!(dir))?;
            if !entry.file_type().map_err(io_err!(entry.path()))?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            ids.push(name);
        }
        ids.sort();
        Ok(ids)
    }

    fn purge_trash(&self) {
        let Ok(entries) = fs::read_dir(self.events_dir()) else {
            return;
        };
        for entry in entries.flatten() {
            if entry.file_name().to_string_lossy().starts_with(TRASH_PREFIX) {
                let path = entry.path();
                match fs::remove_dir_all(&path) {
                    Ok(()) => debug!(?path, "purged leftover scope directory"),
                    Err(e) => warn!(?path, error = %e, "failed to purge leftover scope directory"),
                }
            }
        }
    }
}

/// Decode a collection file. `Ok(None)` means the file does not exist.
fn load<D: Document>(path: &Path) -> StoreResult<Option<D>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(StoreError::Io {
                path: path.to_path_buf(),
                source: e,
            });
        }
    };
    serde_json::from_slice(&bytes).map(Some).map_err(|e| {
        warn!(?path, error = %e, "collection file failed to decode");
        StoreError::Corrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }
    })
}
