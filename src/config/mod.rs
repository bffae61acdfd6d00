//! Configuration for the traffic pipeline
//!
//! One HCL document describes the whole pipeline. Parsing happens once at
//! startup into plain structs, followed by an explicit validation step that
//! fails fast; nothing is re-read or re-bound at request time.

mod gray;
mod jwt;
mod rate_limit;

pub use gray::{GrayConfig, GrayRuleConfig};
pub use jwt::JwtConfig;
pub use rate_limit::RateLimitConfig;

use crate::error::{GatewayError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level pipeline configuration
///
/// # HCL Example
///
/// ```hcl
/// listen = "0.0.0.0:8088"
///
/// jwt {
///   enabled  = true
///   issuer   = "https://id.example.com"
///   jwks_url = "https://id.example.com/.well-known/jwks.json"
/// }
///
/// rate_limit {
///   enabled      = true
///   default_rate = 100
/// }
///
/// gray {
///   enabled = true
///   weight  = 10
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Listen address for the HTTP entrypoint
    #[serde(default = "default_listen")]
    pub listen: String,

    /// JWT validation stage
    #[serde(default)]
    pub jwt: JwtConfig,

    /// Rate-limit stage
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Gray-routing stage
    #[serde(default)]
    pub gray: GrayConfig,
}

fn default_listen() -> String {
    "0.0.0.0:8088".to_string()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            jwt: JwtConfig::default(),
            rate_limit: RateLimitConfig::default(),
            gray: GrayConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from an HCL file.
    ///
    /// The file must contain valid HCL content regardless of extension.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            GatewayError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_hcl(&content)
    }

    /// Parse configuration from an HCL string
    pub fn from_hcl(content: &str) -> Result<Self> {
        hcl::from_str(content)
            .map_err(|e| GatewayError::Config(format!("Failed to parse HCL config: {}", e)))
    }

    /// Validate every section for consistency
    pub fn validate(&self) -> Result<()> {
        if self.listen.is_empty() {
            return Err(GatewayError::Config("listen address is empty".to_string()));
        }
        self.jwt.validate()?;
        self.rate_limit.validate()?;
        self.gray.validate()?;
        Ok(())
    }
}
