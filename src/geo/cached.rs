use crate::cache::ResultCache;
use crate::geo::{GeoError, GeoIpResult, Lookup};

use std::net::IpAddr;
use std::num::NonZeroUsize;

/// Memoizes successful lookups of the wrapped backend, failures are never cached
pub struct CachedLookup<L> {
    lookup: L,
    cache: ResultCache<GeoIpResult>,
}

impl<L: Lookup> CachedLookup<L> {
    pub fn new(lookup: L, cache_size: NonZeroUsize) -> Self {
        Self {
            lookup,
            cache: ResultCache::new(cache_size),
        }
    }

    pub fn inner(&self) -> &L {
        &self.lookup
    }

    pub fn cache(&self) -> &ResultCache<GeoIpResult> {
        &self.cache
    }
}

impl<L: Lookup> Lookup for CachedLookup<L> {
    fn lookup(&self, address: IpAddr) -> Result<GeoIpResult, GeoError> {
        let key = address.to_string();
        if let Some(result) = self.cache.get(&key) {
            return Ok(result);
        }
        let result = self.lookup.lookup(address)?;
        self.cache.add(key, result.clone());
        Ok(result)
    }
}
