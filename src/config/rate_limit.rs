//! Rate-limit configuration

use crate::error::{GatewayError, Result};
use crate::limit::key::KeyStrategy;
use serde::{Deserialize, Serialize};

/// Rate-limit stage configuration
///
/// # Example
///
/// ```hcl
/// rate_limit {
///   enabled          = true
///   default_rate     = 100
///   default_capacity = 200
///   redis_url        = "redis://127.0.0.1:6379"
///   enable_fallback  = true
///   fallback_rate    = 25
///   key_strategy     = ["user", "ip"]
///   timeout_ms       = 50
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Whether the rate-limit stage is assembled into the pipeline
    #[serde(default)]
    pub enabled: bool,

    /// Refill rate in tokens per second (default: 100)
    #[serde(default = "default_rate")]
    pub default_rate: f64,

    /// Bucket capacity; defaults to the rate when omitted
    #[serde(default)]
    pub default_capacity: Option<f64>,

    /// Shared-store URL; absent means local-only limiting
    #[serde(default)]
    pub redis_url: Option<String>,

    /// Degrade to the local tier when the store is unreachable
    /// (default: true). Disabled means fail-closed.
    #[serde(default = "default_true")]
    pub enable_fallback: bool,

    /// Refill rate used by the fallback tier; defaults to half the
    /// default rate when omitted
    #[serde(default)]
    pub fallback_rate: Option<f64>,

    /// Key resolution chain; defaults to user → ip → path → tenant
    #[serde(default)]
    pub key_strategy: Vec<String>,

    /// Shared-store round-trip timeout in milliseconds (default: 50)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_rate() -> f64 {
    100.0
}

fn default_true() -> bool {
    true
}

fn default_timeout_ms() -> u64 {
    50
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            default_rate: default_rate(),
            default_capacity: None,
            redis_url: None,
            enable_fallback: default_true(),
            fallback_rate: None,
            key_strategy: Vec::new(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl RateLimitConfig {
    /// Effective bucket capacity
    pub fn capacity(&self) -> f64 {
        self.default_capacity.unwrap_or(self.default_rate)
    }

    /// Effective fallback refill rate
    pub fn effective_fallback_rate(&self) -> f64 {
        self.fallback_rate.unwrap_or(self.default_rate / 2.0)
    }

    /// Resolve the configured strategy chain
    pub fn strategies(&self) -> Result<Vec<KeyStrategy>> {
        if self.key_strategy.is_empty() {
            return Ok(KeyStrategy::default_chain());
        }
        self.key_strategy
            .iter()
            .map(|name| KeyStrategy::parse(name))
            .collect()
    }

    /// Validate the section; only checked when the stage is enabled
    pub fn validate(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        if self.default_rate <= 0.0 {
            return Err(GatewayError::Config(
                "rate_limit.default_rate must be positive".to_string(),
            ));
        }
        if self.capacity() <= 0.0 {
            return Err(GatewayError::Config(
                "rate_limit.default_capacity must be positive".to_string(),
            ));
        }
        if self.enable_fallback && self.effective_fallback_rate() <= 0.0 {
            return Err(GatewayError::Config(
                "rate_limit.fallback_rate must be positive".to_string(),
            ));
        }
        if self.timeout_ms == 0 {
            return Err(GatewayError::Config(
                "rate_limit.timeout_ms must be greater than zero".to_string(),
            ));
        }
        self.strategies()?;
        Ok(())
    }
}
