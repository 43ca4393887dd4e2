//! Response cache
//!
//! Maps (model, normalized prompt, generation params) to a previously
//! successful [`ProviderResult`]. Bounded by an LRU capacity; entries carry
//! their own TTL and are dropped lazily when read after expiry.

use lru::LruCache;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;
use ultra_domain::core::string::collapse_whitespace;
use ultra_domain::{GenerationParams, ModelId, ProviderResult};

/// Cache sizing and lifetime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub enabled: bool,
    pub capacity: usize,
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 512,
            ttl: Duration::from_secs(900),
        }
    }
}

impl CacheConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

/// Hex-encoded sha256 over the fields that determine a response
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(model: &ModelId, prompt: &str, params: &GenerationParams) -> Self {
        let normalized = collapse_whitespace(prompt);
        let fingerprint = params.fingerprint();

        let mut hasher = Sha256::new();
        for field in [model.as_str(), normalized.as_str(), fingerprint.as_str()] {
            hasher.update((field.len() as u64).to_le_bytes());
            hasher.update(field.as_bytes());
        }
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: ProviderResult,
    created_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.created_at) >= self.ttl
    }
}

/// Process-wide response cache
pub struct ResponseCache {
    entries: Mutex<LruCache<CacheKey, CacheEntry>>,
    default_ttl: Duration,
}

impl ResponseCache {
    pub fn new(config: &CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            default_ttl: config.ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<CacheKey, CacheEntry>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Look up a live entry, dropping it if its TTL has passed
    pub fn get(&self, key: &CacheKey) -> Option<ProviderResult> {
        let mut entries = self.lock();
        let now = Instant::now();

        if let Some(entry) = entries.get(key) {
            if !entry.is_expired(now) {
                return Some(entry.value.clone());
            }
            trace!(key = key.as_str(), "Cache entry expired");
            entries.pop(key);
        }
        None
    }

    /// Store a result with an explicit TTL
    ///
    /// Failed results are ignored; only successful calls are cached.
    pub fn put(&self, key: CacheKey, value: ProviderResult, ttl: Duration) {
        if !value.is_ok() {
            return;
        }
        self.lock().put(
            key,
            CacheEntry {
                value,
                created_at: Instant::now(),
                ttl,
            },
        );
    }

    /// Store a result with the configured TTL
    pub fn insert(&self, key: CacheKey, value: ProviderResult) {
        self.put(key, value, self.default_ttl);
    }

    /// Drop every expired entry
    pub fn prune_expired(&self) -> usize {
        let mut entries = self.lock();
        let now = Instant::now();

        let expired: Vec<CacheKey> = entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            entries.pop(key);
        }
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(&CacheConfig::default())
    }
}
