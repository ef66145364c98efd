//! Snapshot cache for decoded collections.
//!
//! Each entry is an immutable `Arc` of the decoded document. Writers never
//! mutate an entry in place: they build a new document, commit it, and then
//! swap the whole `Arc` in with [`SnapshotCache::publish`]. A reader that
//! already holds the previous `Arc` keeps seeing the previous value.
//!
//! The map itself sits behind a `parking_lot::RwLock` that is only held for
//! map operations, never across disk I/O.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::collection::{CollectionId, Document};

type Snapshot = Arc<dyn Any + Send + Sync>;

/// Cache hit/miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

#[derive(Default)]
pub(crate) struct SnapshotCache {
    entries: RwLock<HashMap<CollectionId, Snapshot>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl SnapshotCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Current snapshot of `id`, if cached.
    pub(crate) fn get<D: Document>(&self, id: &CollectionId) -> Option<Arc<D>> {
        let snapshot = self.entries.read().get(id).cloned();
        match snapshot.map(|s| s.downcast::<D>()) {
            Some(Ok(doc)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(doc)
            }
            Some(Err(_)) => {
                // A document type is bound to its kind, so this only happens
                // if two `Document` impls share a kind.
                warn!(collection = %id, "cached snapshot has unexpected type, evicting");
                self.entries.write().remove(id);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Install a snapshot loaded from disk by a reader.
    ///
    /// A writer may have published a newer value while the file was being
    /// decoded; in that case the cached value wins and is returned instead.
    /// `still_backed` runs under the map lock and must report whether the
    /// backing file still exists, so a load that raced with scope deletion
    /// is handed back to its reader but never cached.
    pub(crate) fn fill<D: Document>(
        &self,
        id: &CollectionId,
        loaded: Arc<D>,
        still_backed: impl FnOnce() -> bool,
    ) -> Arc<D> {
        let mut entries = self.entries.write();
        if let Some(existing) = entries.get(id) {
            if let Ok(doc) = existing.clone().downcast::<D>() {
                return doc;
            }
        }
        if still_backed() {
            let snapshot: Snapshot = loaded.clone();
            entries.insert(id.clone(), snapshot);
            debug!(collection = %id, "collection loaded into cache");
        }
        loaded
    }

    /// Replace the snapshot for `id` after a successful commit.
    pub(crate) fn publish<D: Document>(&self, id: &CollectionId, committed: Arc<D>) {
        let snapshot: Snapshot = committed;
        self.entries.write().insert(id.clone(), snapshot);
    }

    /// Drop the given entries in one step, running `under_lock` while the
    /// map is held exclusively. Readers see either all entries or none.
    pub(crate) fn evict_with<R>(
        &self,
        ids: &[CollectionId],
        under_lock: impl FnOnce() -> R,
    ) -> R {
        let mut entries = self.entries.write();
        let out = under_lock();
        for id in ids {
            entries.remove(id);
        }
        out
    }

    pub(crate) fn evict(&self, id: &CollectionId) {
        self.entries.write().remove(id);
    }

    pub(crate) fn clear(&self) {
        self.entries.write().clear();
    }

    pub(crate) fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.read().len(),
        }
    }
}
