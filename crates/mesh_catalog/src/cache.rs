use crate::library::{MeshEntry, MeshLibrary};
use crate::matcher::{MeshMatcher, MeshResolver};
use dashmap::DashMap;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

type CacheKey = (String, String);

/// Point-in-time view of the cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
    pub keys: Vec<CacheKey>,
}

/// [`MeshMatcher`] memoised on the literal `(type, name)` pair.
///
/// Misses are cached too. The map is unbounded: one session only sees a small,
/// finite set of distinct pairs.
pub struct CachedMeshFinder {
    matcher: MeshMatcher,
    cache: DashMap<CacheKey, Option<Arc<MeshEntry>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CachedMeshFinder {
    pub fn new(library: Arc<MeshLibrary>) -> Self {
        Self {
            matcher: MeshMatcher::new(library),
            cache: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn find(&self, kind: &str, name: &str) -> Option<Arc<MeshEntry>> {
        let key = (kind.to_owned(), name.to_owned());
        if let Some(cached) = self.cache.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return cached.value().clone();
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let found = self.matcher.find_best_mesh(kind, name);
        self.cache.insert(key, found.clone());
        found
    }

    pub fn clear(&self) {
        self.cache.clear();
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.cache.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            keys: self.cache.iter().map(|entry| entry.key().clone()).collect(),
        }
    }
}

impl MeshResolver for CachedMeshFinder {
    fn resolve(&self, kind: &str, name: &str) -> Option<Arc<MeshEntry>> {
        self.find(kind, name)
    }
}
