//! Rate limiting — hybrid local/distributed token buckets

pub mod bucket;
pub mod coordinator;
pub mod distributed;
pub mod key;
pub mod local;

pub use bucket::{Acquire, BucketParams, TokenBucket};
pub use coordinator::{RateDecision, RateLimitCoordinator};
pub use distributed::DistributedLimiter;
pub use key::{resolve_key, KeyStrategy, RateLimitKey};
pub use local::LocalLimiter;
