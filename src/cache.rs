use moka::sync::Cache;
use std::num::NonZeroUsize;

/// Thread-safe bounded cache of lookup results keyed by textual IP address.
///
/// Eviction and admission follow moka's TinyLFU policy: a new key only replaces a resident one if
/// it is estimated to be used at least as often. Missing keys and rejected insertions are not
/// errors.
pub struct ResultCache<V> {
    cache: Cache<String, V>,
}

impl<V: Clone + Send + Sync + 'static> ResultCache<V> {
    /// Cache holding at most `size` values
    pub fn new(size: NonZeroUsize) -> Self {
        Self {
            cache: Cache::builder().max_capacity(size.get() as u64).build(),
        }
    }

    pub fn add(&self, key: String, value: V) {
        self.cache.insert(key, value);
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.cache.get(key)
    }

    /// Number of resident entries, pending evictions are applied first
    pub fn len(&self) -> usize {
        self.cache.run_pending_tasks();
        self.cache.entry_count() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.cache
            .policy()
            .max_capacity()
            .map_or(usize::MAX, |capacity| capacity as usize)
    }
}
