//! Decision cache
//!
//! Bounded in-memory cache keyed by a digest of the system version and the
//! normalized message. Exact match only: two messages share an entry iff
//! their normalized forms are byte-identical. Bumping the system version
//! changes every digest at once, so invalidation needs no sweep; superseded
//! entries age out through TTL and LRU pressure, or are removed lazily when
//! touched.
//!
//! Reads take the shared lock and bump a per-entry atomic access stamp, so
//! concurrent lookups never queue behind each other; only inserts and lazy
//! evictions take the exclusive lock.

use crate::decision::RoutingDecision;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// Cache key: SHA-256 over (system_version, normalized message)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn compute(system_version: u64, normalized_message: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(system_version.to_be_bytes());
        hasher.update([0x1f]);
        hasher.update(normalized_message.as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

struct CacheEntry {
    decision: RoutingDecision,
    created_at: Instant,
    ttl: Duration,
    system_version: u64,
    last_access: AtomicU64,
}

impl CacheEntry {
    fn is_live(&self, current_version: u64) -> bool {
        self.system_version == current_version && self.created_at.elapsed() < self.ttl
    }

    fn touch(&self, clock: &AtomicU64) {
        let stamp = clock.fetch_add(1, Ordering::Relaxed) + 1;
        self.last_access.store(stamp, Ordering::Relaxed);
    }
}

/// Bounded LRU + TTL cache for routing decisions
pub struct DecisionCache {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    capacity: usize,
    clock: AtomicU64,
}

impl DecisionCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity: capacity.max(1),
            clock: AtomicU64::new(0),
        }
    }

    /// Look up a decision; expired or version-mismatched entries are misses
    /// and are removed on the way out
    pub fn get(&self, key: &CacheKey, current_version: u64) -> Option<RoutingDecision> {
        {
            let entries = self.entries.read().unwrap();
            match entries.get(key) {
                None => return None,
                Some(entry) if entry.is_live(current_version) => {
                    entry.touch(&self.clock);
                    return Some(entry.decision.clone());
                }
                Some(_) => {} // stale; fall through to evict under the write lock
            }
        }

        let mut entries = self.entries.write().unwrap();
        let live = match entries.get(key) {
            Some(entry) if entry.is_live(current_version) => {
                // Re-inserted between the two locks; serve it after all
                entry.touch(&self.clock);
                Some(entry.decision.clone())
            }
            Some(_) => None,
            None => return None,
        };
        if live.is_none() {
            entries.remove(key);
        }
        live
    }

    /// Store a decision under the current version, evicting the
    /// least-recently-used entry when at capacity
    pub fn insert(&self, key: CacheKey, decision: RoutingDecision, system_version: u64) {
        let ttl = decision.cache_ttl();
        if ttl.is_zero() {
            return;
        }

        let mut entries = self.entries.write().unwrap();
        if entries.len() >= self.capacity && !entries.contains_key(&key) {
            let coldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_access.load(Ordering::Relaxed))
                .map(|(k, _)| k.clone());
            if let Some(coldest) = coldest {
                entries.remove(&coldest);
            }
        }

        let entry = CacheEntry {
            decision,
            created_at: Instant::now(),
            ttl,
            system_version,
            last_access: AtomicU64::new(0),
        };
        entry.touch(&self.clock);
        entries.insert(key, entry);
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[cfg(test)]
    fn insert_with_ttl(
        &self,
        key: CacheKey,
        decision: RoutingDecision,
        system_version: u64,
        ttl: Duration,
    ) {
        let mut entries = self.entries.write().unwrap();
        let entry = CacheEntry {
            decision,
            created_at: Instant::now(),
            ttl,
            system_version,
            last_access: AtomicU64::new(0),
        };
        entry.touch(&self.clock);
        entries.insert(key, entry);
    }
}
