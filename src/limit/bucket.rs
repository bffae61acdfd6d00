//! Token bucket — continuous refill, fractional tokens

use std::time::Instant;

/// Capacity and refill rate for one bucket
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketParams {
    /// Maximum tokens the bucket holds
    pub capacity: f64,
    /// Refill rate in tokens per second
    pub rate: f64,
}

/// Result of one acquisition attempt
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Acquire {
    /// Cost was deducted
    Admitted {
        /// Tokens left after deduction
        remaining: f64,
    },
    /// Not enough tokens
    Rejected {
        /// Seconds until the missing tokens refill
        retry_after: f64,
    },
}

/// Mutable bucket state: current tokens and last refill time.
///
/// `0 <= tokens <= capacity` holds at all times; refill is monotonic and
/// never moves backward in time.
#[derive(Debug)]
pub struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// A bucket starting full
    pub fn full(params: &BucketParams, now: Instant) -> Self {
        Self {
            tokens: params.capacity,
            last_refill: now,
        }
    }

    /// Refill for elapsed time, then try to deduct `cost` tokens.
    pub fn try_acquire(&mut self, params: &BucketParams, cost: f64, now: Instant) -> Acquire {
        // saturating: a now earlier than last_refill refills nothing
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * params.rate).min(params.capacity);
        self.last_refill = self.last_refill.max(now);

        if self.tokens >= cost {
            self.tokens -= cost;
            Acquire::Admitted {
                remaining: self.tokens,
            }
        } else {
            Acquire::Rejected {
                retry_after: (cost - self.tokens) / params.rate,
            }
        }
    }

    /// Current token count
    pub fn tokens(&self) -> f64 {
        self.tokens
    }
}
