//! Gray-release configuration

use crate::error::{GatewayError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Gray-release stage configuration
///
/// # Example
///
/// ```hcl
/// gray {
///   enabled = true
///   weight  = 15
///
///   rules "beta-testers" {
///     priority = 10
///     user_ids = ["user-7", "user-9"]
///     version  = "v2"
///   }
///
///   rules "office-network" {
///     priority  = 5
///     ip_ranges = ["10.20.0.0/16"]
///   }
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GrayConfig {
    /// Whether the gray-routing stage is assembled into the pipeline
    #[serde(default)]
    pub enabled: bool,

    /// Percentage of unmatched traffic routed to gray, 0..=100
    #[serde(default)]
    pub weight: u32,

    /// Named routing rules
    #[serde(default)]
    pub rules: HashMap<String, GrayRuleConfig>,
}

/// One configured rule.
///
/// Exactly one matcher kind must be set: a header (with value or prefix),
/// a cookie, a query parameter, a user allowlist, or IP ranges.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GrayRuleConfig {
    /// Evaluation priority; higher runs first
    #[serde(default)]
    pub priority: i64,

    /// Header name to match
    #[serde(default)]
    pub header: Option<String>,

    /// Exact header value
    #[serde(default)]
    pub header_value: Option<String>,

    /// Header value prefix
    #[serde(default)]
    pub header_prefix: Option<String>,

    /// Cookie name to match
    #[serde(default)]
    pub cookie: Option<String>,

    /// Exact cookie value
    #[serde(default)]
    pub cookie_value: Option<String>,

    /// Query parameter name to match
    #[serde(default)]
    pub query: Option<String>,

    /// Exact query parameter value
    #[serde(default)]
    pub query_value: Option<String>,

    /// User-ID allowlist
    #[serde(default)]
    pub user_ids: Vec<String>,

    /// IP/CIDR ranges
    #[serde(default)]
    pub ip_ranges: Vec<String>,

    /// Version tag for matching traffic
    #[serde(default)]
    pub version: Option<String>,
}

impl GrayRuleConfig {
    /// Number of matcher kinds this rule sets
    pub fn matcher_count(&self) -> usize {
        [
            self.header.is_some(),
            self.cookie.is_some(),
            self.query.is_some(),
            !self.user_ids.is_empty(),
            !self.ip_ranges.is_empty(),
        ]
        .iter()
        .filter(|set| **set)
        .count()
    }
}

impl GrayConfig {
    /// Validate the section; only checked when the stage is enabled.
    ///
    /// Rule compilation itself (CIDR parsing and matcher completeness) is
    /// exercised by `GraySettings::from_config` at pipeline build time;
    /// this check fails fast on the same conditions.
    pub fn validate(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        if self.weight > 100 {
            return Err(GatewayError::Config(format!(
                "gray.weight must be within 0..=100, got {}",
                self.weight
            )));
        }
        crate::gray::GraySettings::from_config(self).map(|_| ())
    }
}
