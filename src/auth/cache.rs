//! Credential cache — verified claims keyed by token fingerprint
//!
//! Entries carry a TTL and are treated as absent once expired; expired
//! entries are removed lazily on lookup or insert. A revocation signal
//! evicts immediately, forcing re-verification on next use.

use crate::auth::claims::JwtClaims;
use sha2::{Digest, Sha256};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::RwLock;
use std::time::{Duration, Instant};

const SHARD_COUNT: usize = 16;

struct CacheEntry {
    claims: JwtClaims,
    inserted_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.inserted_at) >= self.ttl
    }
}

/// Sharded in-process cache of verified claims.
///
/// Shared across all request handlers in one process; all operations are
/// synchronous and never yield.
pub struct CredentialCache {
    shards: Vec<RwLock<HashMap<String, CacheEntry>>>,
    max_per_shard: usize,
}

impl CredentialCache {
    /// Create a cache holding at most `max_size` entries
    pub fn new(max_size: usize) -> Self {
        let shards = (0..SHARD_COUNT)
            .map(|_| RwLock::new(HashMap::new()))
            .collect();
        Self {
            shards,
            max_per_shard: (max_size / SHARD_COUNT).max(1),
        }
    }

    /// Stable fingerprint of a raw token string (SHA-256, hex)
    pub fn fingerprint(token: &str) -> String {
        let digest = Sha256::digest(token.as_bytes());
        digest.iter().map(|b| format!("{:02x}", b)).collect()
    }

    fn shard(&self, fingerprint: &str) -> &RwLock<HashMap<String, CacheEntry>> {
        let mut hasher = DefaultHasher::new();
        fingerprint.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % SHARD_COUNT]
    }

    /// Look up unexpired claims for a fingerprint.
    ///
    /// An expired entry is removed and reported as absent.
    pub fn get(&self, fingerprint: &str) -> Option<JwtClaims> {
        let now = Instant::now();
        let shard = self.shard(fingerprint);

        {
            let entries = shard.read().unwrap_or_else(|e| e.into_inner());
            match entries.get(fingerprint) {
                Some(entry) if !entry.is_expired(now) => return Some(entry.claims.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        // Entry exists but expired: upgrade to a write lock and drop it
        let mut entries = shard.write().unwrap_or_else(|e| e.into_inner());
        if entries.get(fingerprint).is_some_and(|e| e.is_expired(now)) {
            entries.remove(fingerprint);
        }
        None
    }

    /// Insert verified claims with the given TTL.
    ///
    /// When the shard is full, expired entries are purged first; if it is
    /// still full the oldest entry makes room.
    pub fn insert(&self, fingerprint: String, claims: JwtClaims, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }
        let now = Instant::now();
        let mut entries = self
            .shard(&fingerprint)
            .write()
            .unwrap_or_else(|e| e.into_inner());

        if entries.len() >= self.max_per_shard && !entries.contains_key(&fingerprint) {
            entries.retain(|_, e| !e.is_expired(now));
            if entries.len() >= self.max_per_shard {
                if let Some(oldest) = entries
                    .iter()
                    .min_by_key(|(_, e)| e.inserted_at)
                    .map(|(k, _)| k.clone())
                {
                    entries.remove(&oldest);
                }
            }
        }

        entries.insert(
            fingerprint,
            CacheEntry {
                claims,
                inserted_at: now,
                ttl,
            },
        );
    }

    /// Evict a fingerprint immediately (revocation).
    ///
    /// Returns whether an entry was present.
    pub fn revoke(&self, fingerprint: &str) -> bool {
        self.shard(fingerprint)
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(fingerprint)
            .is_some()
    }

    /// Number of entries currently held (including not-yet-purged expired ones)
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|s| s.read().unwrap_or_else(|e| e.into_inner()).len())
            .sum()
    }

    /// Whether the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
