//! Resolution cache
//!
//! Entries are keyed by widget and filter-context version, so a version bump
//! makes every older entry unreachable. Stale entries are dropped lazily by
//! [`ResolutionCache::retain_version`] or evicted when the cache is full.

use std::sync::Arc;

use ahash::RandomState;
use indexmap::IndexMap;
use parking_lot::RwLock;

use dash_core::LocalId;

use crate::resolver::{Resolution, ResolveError};

pub type CachedResolution = Result<Resolution, ResolveError>;

/// Cache of resolved widget filters
pub struct ResolutionCache {
    entries: Arc<RwLock<IndexMap<(LocalId, u64), CachedResolution, RandomState>>>,
    /// Maximum number of entries to keep
    capacity: usize,
}

impl ResolutionCache {
    /// Create a new cache holding at most `capacity` entries
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Arc::new(RwLock::new(IndexMap::with_hasher(RandomState::new()))),
            capacity: capacity.max(1),
        }
    }

    pub fn get(&self, widget: &LocalId, version: u64) -> Option<CachedResolution> {
        self.entries.read().get(&(widget.clone(), version)).cloned()
    }

    /// Store a resolution, evicting the oldest entry when full
    pub fn put(&self, widget: LocalId, version: u64, resolution: CachedResolution) {
        let mut entries = self.entries.write();
        let key = (widget, version);
        if entries.len() >= self.capacity && !entries.contains_key(&key) {
            entries.shift_remove_index(0);
        }
        entries.insert(key, resolution);
    }

    /// Forget every version of one widget
    pub fn invalidate(&self, widget: &LocalId) {
        self.entries.write().retain(|(id, _), _| id != widget);
    }

    /// Drop entries computed for any other filter version
    pub fn retain_version(&self, version: u64) {
        self.entries.write().retain(|(_, v), _| *v == version);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Clear the cache
    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty() -> CachedResolution {
        Ok(Resolution {
            filters: Vec::new(),
            warnings: Vec::new(),
        })
    }

    #[test]
    fn test_version_keys() {
        let cache = ResolutionCache::new(8);
        let w = LocalId::from("w");
        cache.put(w.clone(), 1, empty());
        assert!(cache.get(&w, 1).is_some());
        assert!(cache.get(&w, 2).is_none());

        cache.put(w.clone(), 2, empty());
        cache.retain_version(2);
        assert_eq!(cache.len(), 1);
        cache.invalidate(&w);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_evicts_oldest() {
        let cache = ResolutionCache::new(2);
        cache.put(LocalId::from("a"), 0, empty());
        cache.put(LocalId::from("b"), 0, empty());
        cache.put(LocalId::from("c"), 0, empty());
        assert!(cache.get(&LocalId::from("a"), 0).is_none());
        assert!(cache.get(&LocalId::from("c"), 0).is_some());
    }
}
