//! Verifier-local kid → verification key cache.
//!
//! Entries never expire. A rotated authority key needs a process restart.

use std::sync::Arc;

use dashmap::DashMap;
use jsonwebtoken::DecodingKey;

/// Concurrent kid → key map, injected into the verifier.
pub trait KeyCache: Send + Sync {
    /// Cached key for `kid`, if any.
    fn get(&self, kid: &str) -> Option<Arc<DecodingKey>>;

    /// Remember `key` for `kid`.
    fn insert(&self, kid: &str, key: Arc<DecodingKey>);
}

/// Process-lifetime cache backed by a `DashMap`.
#[derive(Default)]
pub struct InMemoryKeyCache {
    inner: DashMap<String, Arc<DecodingKey>>,
}

impl InMemoryKeyCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl KeyCache for InMemoryKeyCache {
    fn get(&self, kid: &str) -> Option<Arc<DecodingKey>> {
        self.inner.get(kid).map(|entry| Arc::clone(entry.value()))
    }

    fn insert(&self, kid: &str, key: Arc<DecodingKey>) {
        self.inner.insert(kid.to_string(), key);
    }
}

/// Cache that never holds anything; every verification fetches the key set.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopKeyCache;

impl KeyCache for NoopKeyCache {
    fn get(&self, _kid: &str) -> Option<Arc<DecodingKey>> {
        None
    }

    fn insert(&self, _kid: &str, _key: Arc<DecodingKey>) {}
}
