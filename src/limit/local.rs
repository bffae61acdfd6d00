//! In-process rate limiting — sharded token-bucket map
//!
//! Used standalone in single-node deployments and as the fallback tier when
//! the shared store is unreachable. Per-key mutation is serialized by the
//! owning shard's mutex; operations are synchronous and never yield.

use crate::limit::bucket::{Acquire, BucketParams, TokenBucket};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;
use std::time::Instant;

const SHARD_COUNT: usize = 16;

/// Sharded map of token buckets keyed by storage key
pub struct LocalLimiter {
    shards: Vec<Mutex<HashMap<String, TokenBucket>>>,
}

impl Default for LocalLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalLimiter {
    /// Create an empty limiter
    pub fn new() -> Self {
        Self {
            shards: (0..SHARD_COUNT).map(|_| Mutex::new(HashMap::new())).collect(),
        }
    }

    fn shard(&self, key: &str) -> &Mutex<HashMap<String, TokenBucket>> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        &self.shards[(hasher.finish() as usize) % SHARD_COUNT]
    }

    /// Refill-then-deduct for one key.
    ///
    /// A key seen for the first time starts with a full bucket.
    pub fn admit(&self, key: &str, params: &BucketParams, cost: f64) -> Acquire {
        let now = Instant::now();
        let mut shard = self.shard(key).lock().unwrap_or_else(|e| e.into_inner());
        let bucket = shard
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::full(params, now));
        bucket.try_acquire(params, cost, now)
    }

    /// Number of tracked keys
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|s| s.lock().unwrap_or_else(|e| e.into_inner()).len())
            .sum()
    }

    /// Whether no keys are tracked yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const PARAMS: BucketParams = BucketParams {
        capacity: 5.0,
        rate: 1.0,
    };

    #[test]
    fn test_first_use_starts_full() {
        let limiter = LocalLimiter::new();
        match limiter.admit("k1", &PARAMS, 1.0) {
            Acquire::Admitted { remaining } => assert!((remaining - 4.0).abs() < 1e-6),
            other => panic!("Expected admission, got {:?}", other),
        }
    }

    #[test]
    fn test_capacity_exhaustion_rejects() {
        let limiter = LocalLimiter::new();
        for _ in 0..5 {
            assert!(matches!(
                limiter.admit("k1", &PARAMS, 1.0),
                Acquire::Admitted { .. }
            ));
        }
        match limiter.admit("k1", &PARAMS, 1.0) {
            Acquire::Rejected { retry_after } => {
                assert!(retry_after > 0.9 && retry_after <= 1.0);
            }
            other => panic!("Expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_keys_are_independent() {
        let limiter = LocalLimiter::new();
        for _ in 0..5 {
            limiter.admit("k1", &PARAMS, 1.0);
        }
        assert!(matches!(
            limiter.admit("k2", &PARAMS, 1.0),
            Acquire::Admitted { .. }
        ));
        assert_eq!(limiter.len(), 2);
    }

    #[test]
    fn test_no_over_admission_under_concurrency() {
        let limiter = Arc::new(LocalLimiter::new());
        let admitted = Arc::new(AtomicUsize::new(0));
        let mut handles = vec![];

        for _ in 0..20 {
            let limiter = limiter.clone();
            let admitted = admitted.clone();
            handles.push(std::thread::spawn(move || {
                if matches!(
                    limiter.admit("shared", &PARAMS, 1.0),
                    Acquire::Admitted { .. }
                ) {
                    admitted.fetch_add(1, Ordering::Relaxed);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        // Capacity 5: at most 5 of 20 concurrent calls admitted
        assert!(admitted.load(Ordering::Relaxed) <= 5);
    }
}
