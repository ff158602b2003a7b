//! Bounded TTL cache for generation-service responses.
//!
//! Logically identical requests collapse to one slot: the key is a SHA-256
//! digest of the canonicalized request (stable field order, trimmed text).
//! Entries live in insertion order, which doubles as eviction order: every
//! access sweeps the expired prefix, and inserts additionally evict the
//! oldest survivors once over capacity.
//!
//! The cache is the only shared-mutable object in the pipeline. All access
//! is serialized behind one lock whose critical section covers only
//! lookup/sweep/insert, never an outbound call, and it is never held across
//! a suspension point. Cache operations never fail: a poisoned lock or a
//! disabled configuration degrades to "always miss".

use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use textgen::GenerationRequest;

struct CacheEntry<V> {
    created_at: Instant,
    value: V,
}

/// Process-wide response cache, injected where it is used.
pub struct ResponseCache<V> {
    entries: Mutex<VecDeque<(String, CacheEntry<V>)>>,
    ttl: Duration,
    capacity: usize,
    enabled: bool,
}

impl<V: Clone> ResponseCache<V> {
    /// Create a cache with the given TTL and capacity.
    ///
    /// A zero TTL or zero capacity disables the cache entirely: `get`
    /// always misses and `set` is a no-op.
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            ttl,
            capacity,
            enabled: !ttl.is_zero() && capacity > 0,
        }
    }

    /// Whether the cache is active.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Look up a key, returning a clone of the stored value on a hit.
    pub fn get(&self, key: &str) -> Option<V> {
        if !self.enabled {
            return None;
        }
        let now = Instant::now();
        let mut entries = self.lock();
        Self::sweep_expired(&mut entries, now, self.ttl);

        entries
            .iter()
            .find(|(stored, entry)| {
                stored.as_str() == key && now.duration_since(entry.created_at) <= self.ttl
            })
            .map(|(_, entry)| entry.value.clone())
    }

    /// Store a value under a key, replacing any previous entry.
    pub fn set(&self, key: impl Into<String>, value: V) {
        if !self.enabled {
            return;
        }
        let key = key.into();
        let now = Instant::now();
        let mut entries = self.lock();
        Self::sweep_expired(&mut entries, now, self.ttl);

        entries.retain(|(stored, _)| stored != &key);
        entries.push_back((
            key,
            CacheEntry {
                created_at: now,
                value,
            },
        ));

        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of entries currently held (expired ones included until the
    /// next access sweeps them).
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<(String, CacheEntry<V>)>> {
        // A poisoned lock only means a panicking thread died mid-access;
        // the queue itself is still structurally sound.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn sweep_expired(
        entries: &mut VecDeque<(String, CacheEntry<V>)>,
        now: Instant,
        ttl: Duration,
    ) {
        // Entries sit in insertion order with nondecreasing timestamps, so
        // the expired set is always a prefix.
        while entries
            .front()
            .map(|(_, entry)| now.duration_since(entry.created_at) > ttl)
            .unwrap_or(false)
        {
            entries.pop_front();
        }
    }
}

/// Derive the cache key for a request: SHA-256 over the canonical JSON form.
pub fn request_key(request: &GenerationRequest) -> String {
    let canonical = request.canonical();
    let payload = serde_json::to_string(&canonical)
        .unwrap_or_else(|_| format!("{}\u{1f}{}", canonical.model, canonical.prompt));
    let digest = Sha256::digest(payload.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}
