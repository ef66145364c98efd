//! Per-collection write locks with bounded wait.
//!
//! One `parking_lot::Mutex<()>` per collection identity, created on first
//! use. A lock is only ever held for the duration of a single closure, so
//! no protocol step keeps a collection locked while it works on another.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Mutex, MutexGuard};
use tracing::warn;

use crate::collection::CollectionId;
use crate::error::{StoreError, StoreResult};

pub(crate) struct LockTable {
    locks: Mutex<HashMap<CollectionId, Arc<Mutex<()>>>>,
    timeout: Duration,
}

impl LockTable {
    pub(crate) fn new(timeout: Duration) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    pub(crate) fn timeout(&self) -> Duration {
        self.timeout
    }

    fn mutex_for(&self, id: &CollectionId) -> Arc<Mutex<()>> {
        self.locks.lock().entry(id.clone()).or_default().clone()
    }

    fn acquire<'a>(&self, id: &CollectionId, mutex: &'a Mutex<()>) -> StoreResult<MutexGuard<'a, ()>> {
        let started = Instant::now();
        mutex.try_lock_for(self.timeout).ok_or_else(|| {
            let waited = started.elapsed();
            warn!(collection = %id, ?waited, "write lock timeout");
            StoreError::LockTimeout {
                collection: id.to_string(),
                waited,
            }
        })
    }

    /// Run `f` while holding the write lock for `id`.
    pub(crate) fn with_lock<R>(
        &self,
        id: &CollectionId,
        f: impl FnOnce() -> StoreResult<R>,
    ) -> StoreResult<R> {
        let mutex = self.mutex_for(id);
        let _guard = self.acquire(id, &mutex)?;
        f()
    }

    /// Run `f` while holding the write locks for all of `ids`, acquired in
    /// the given order. Fails without running `f` if any lock times out;
    /// locks already taken are released on return.
    pub(crate) fn with_all<R>(
        &self,
        ids: &[CollectionId],
        f: impl FnOnce() -> StoreResult<R>,
    ) -> StoreResult<R> {
        let mutexes: Vec<Arc<Mutex<()>>> = ids.iter().map(|id| self.mutex_for(id)).collect();
        let mut guards = Vec::with_capacity(ids.len());
        for (id, mutex) in ids.iter().zip(&mutexes) {
            guards.push(self.acquire(id, mutex)?);
        }
        let out = f();
        drop(guards);
        out
    }

    /// Forget the lock entries of collections that no longer exist.
    pub(crate) fn forget(&self, ids: &[CollectionId]) {
        let mut locks = self.locks.lock();
        for id in ids {
            locks.remove(id);
        }
    }
}
