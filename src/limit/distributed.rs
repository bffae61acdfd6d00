//! Distributed rate limiting — atomic token bucket in a shared store
//!
//! The whole check-refill-compare-decrement sequence executes as a single
//! Lua script, so all gateway instances sharing a key observe one serialized
//! sequence of bucket mutations. The store's script atomicity is the only
//! cross-instance guarantee used; there is no two-phase commit.

use crate::error::Result;
use crate::limit::bucket::{Acquire, BucketParams};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;

/// Atomic token bucket: read, refill, compare, decrement, write in one
/// round trip.
///
/// KEYS[1] = bucket key; ARGV = rate, capacity, cost, now (seconds, float).
/// Returns {admitted, tokens remaining, retry-after}; the floats travel as
/// strings because the store truncates script numbers to integers.
const TOKEN_BUCKET_SCRIPT: &str = r#"
local key = KEYS[1]
local rate = tonumber(ARGV[1])
local capacity = tonumber(ARGV[2])
local cost = tonumber(ARGV[3])
local now = tonumber(ARGV[4])

local data = redis.call('HMGET', key, 'tokens', 'last_refill')
local tokens = tonumber(data[1])
local last_refill = tonumber(data[2])

if tokens == nil then
    tokens = capacity
    last_refill = now
end

local elapsed = math.max(0, now - last_refill)
tokens = math.min(capacity, tokens + elapsed * rate)

local admitted = 0
local retry_after = 0
if tokens >= cost then
    admitted = 1
    tokens = tokens - cost
else
    retry_after = (cost - tokens) / rate
end

redis.call('HMSET', key, 'tokens', tokens, 'last_refill', now)
redis.call('EXPIRE', key, math.ceil(capacity / rate) + 10)

return {admitted, tostring(tokens), tostring(retry_after)}
"#;

/// Store-backed limiter shared by the whole gateway fleet
pub struct DistributedLimiter {
    /// Connection, established lazily on first use
    connection: Arc<Mutex<Option<redis::aio::MultiplexedConnection>>>,
    redis_url: String,
    script: redis::Script,
}

impl DistributedLimiter {
    /// Create a limiter for the given store URL.
    ///
    /// The URL is validated eagerly; the connection itself is deferred.
    pub fn new(redis_url: impl Into<String>) -> Result<Self> {
        let redis_url = redis_url.into();
        redis::Client::open(redis_url.as_str())?;
        Ok(Self {
            connection: Arc::new(Mutex::new(None)),
            redis_url,
            script: redis::Script::new(TOKEN_BUCKET_SCRIPT),
        })
    }

    /// Get or create the store connection
    async fn get_connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        let mut guard = self.connection.lock().await;
        if let Some(ref conn) = *guard {
            return Ok(conn.clone());
        }

        let client = redis::Client::open(self.redis_url.as_str())?;
        let conn = client.get_multiplexed_async_connection().await?;
        *guard = Some(conn.clone());
        Ok(conn)
    }

    /// Execute the atomic bucket operation for one key.
    ///
    /// Store errors propagate to the coordinator, which applies the
    /// fallback policy; this tier never decides availability trade-offs.
    pub async fn admit(
        &self,
        storage_key: &str,
        params: &BucketParams,
        cost: f64,
    ) -> Result<Acquire> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs_f64();

        let mut conn = self.get_connection().await?;
        let (admitted, tokens, retry_after): (i64, String, String) = self
            .script
            .key(storage_key)
            .arg(params.rate)
            .arg(params.capacity)
            .arg(cost)
            .arg(now)
            .invoke_async(&mut conn)
            .await?;

        let remaining = tokens.parse::<f64>().unwrap_or(0.0);
        let retry_after = retry_after.parse::<f64>().unwrap_or(0.0);

        if admitted == 1 {
            Ok(Acquire::Admitted { remaining })
        } else {
            Ok(Acquire::Rejected { retry_after })
        }
    }
}
