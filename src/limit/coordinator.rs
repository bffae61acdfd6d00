//! Rate-limit coordination — distributed tier with local fallback
//!
//! The distributed tier is authoritative when reachable. On store error or
//! timeout the coordinator either degrades to the local tier at a lower
//! configured rate (fallback enabled) or fails closed (fallback disabled).
//! Degradation is reported on the decision, not as an error.

use crate::context::RequestContext;
use crate::limit::bucket::{Acquire, BucketParams};
use crate::limit::distributed::DistributedLimiter;
use crate::limit::key::{resolve_key, KeyStrategy, RateLimitKey};
use crate::limit::local::LocalLimiter;
use std::time::Duration;

/// Namespace prefix for limiter keys in both tiers
const KEY_PREFIX: &str = "pylon:ratelimit";
/// Logical bucket served by this coordinator
const DEFAULT_BUCKET: &str = "default";

/// Outcome of an admission check
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RateDecision {
    /// Request admitted; cost deducted
    Admitted {
        /// Tokens left in the deciding tier's bucket
        remaining: f64,
        /// Whether the local fallback tier decided
        degraded: bool,
    },
    /// Request rejected
    Rejected {
        /// Seconds until an equivalent request would be admitted
        retry_after: f64,
        /// Whether the local fallback tier decided
        degraded: bool,
    },
}

impl RateDecision {
    /// Whether the request was admitted
    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted { .. })
    }

    /// Whether the fallback tier produced this decision
    pub fn is_degraded(&self) -> bool {
        match self {
            Self::Admitted { degraded, .. } | Self::Rejected { degraded, .. } => *degraded,
        }
    }
}

/// Composes the local and distributed tiers under one fallback policy
pub struct RateLimitCoordinator {
    local: LocalLimiter,
    distributed: Option<DistributedLimiter>,
    params: BucketParams,
    /// Lower-rate parameters used when the store is unreachable
    fallback: Option<BucketParams>,
    strategies: Vec<KeyStrategy>,
    store_timeout: Duration,
}

impl RateLimitCoordinator {
    /// Create a coordinator.
    ///
    /// Without a distributed tier the local tier is authoritative and the
    /// fallback policy never applies.
    pub fn new(
        params: BucketParams,
        distributed: Option<DistributedLimiter>,
        fallback: Option<BucketParams>,
        strategies: Vec<KeyStrategy>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            local: LocalLimiter::new(),
            distributed,
            params,
            fallback,
            strategies,
            store_timeout,
        }
    }

    /// Resolve the limiter key for a request
    pub fn resolve(&self, ctx: &RequestContext) -> RateLimitKey {
        resolve_key(&self.strategies, DEFAULT_BUCKET, ctx)
    }

    /// Check and deduct `cost` tokens for `key`.
    pub async fn admit(&self, key: &RateLimitKey, cost: f64) -> RateDecision {
        let storage_key = key.storage_key(KEY_PREFIX);

        let Some(distributed) = &self.distributed else {
            return decision(self.local.admit(&storage_key, &self.params, cost), false);
        };

        let attempt = tokio::time::timeout(
            self.store_timeout,
            distributed.admit(&storage_key, &self.params, cost),
        )
        .await;

        match attempt {
            Ok(Ok(acquire)) => decision(acquire, false),
            Ok(Err(e)) => self.degrade(&storage_key, cost, &e.to_string()),
            Err(_) => self.degrade(&storage_key, cost, "store timeout"),
        }
    }

    /// Apply the fallback policy after a distributed-tier failure
    fn degrade(&self, storage_key: &str, cost: f64, cause: &str) -> RateDecision {
        match &self.fallback {
            Some(fallback_params) => {
                tracing::warn!(
                    key = storage_key,
                    cause,
                    "Distributed limiter unavailable, falling back to local tier"
                );
                decision(self.local.admit(storage_key, fallback_params, cost), true)
            }
            None => {
                // Fail closed: the store error is itself a rejection
                tracing::warn!(
                    key = storage_key,
                    cause,
                    "Distributed limiter unavailable and fallback disabled, rejecting"
                );
                RateDecision::Rejected {
                    retry_after: cost / self.params.rate,
                    degraded: false,
                }
            }
        }
    }
}

fn decision(acquire: Acquire, degraded: bool) -> RateDecision {
    match acquire {
        Acquire::Admitted { remaining } => RateDecision::Admitted { remaining, degraded },
        Acquire::Rejected { retry_after } => RateDecision::Rejected {
            retry_after,
            degraded,
        },
    }
}
