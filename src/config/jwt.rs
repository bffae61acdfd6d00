//! JWT validation configuration

use crate::auth::ignore::IgnoreList;
use crate::error::{GatewayError, Result};
use serde::{Deserialize, Serialize};

/// JWT stage configuration
///
/// # Example
///
/// ```hcl
/// jwt {
///   enabled         = true
///   issuer          = "https://id.example.com"
///   jwks_url        = "https://id.example.com/.well-known/jwks.json"
///   ignore_paths    = ["/health", "/public/**"]
///   cache_ttl_secs  = 300
///   cache_max_size  = 10000
///   clock_skew_secs = 5
///   revocation_url  = "redis://127.0.0.1:6379"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Whether the JWT stage is assembled into the pipeline
    #[serde(default)]
    pub enabled: bool,

    /// Expected `iss` claim
    #[serde(default)]
    pub issuer: String,

    /// JWKS endpoint publishing the verification keys
    #[serde(default)]
    pub jwks_url: String,

    /// Paths that bypass validation (segment globs, trailing `**`)
    #[serde(default)]
    pub ignore_paths: Vec<String>,

    /// Verified-claims cache TTL in seconds (default: 300)
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    /// Verified-claims cache capacity (default: 10000)
    #[serde(default = "default_cache_max_size")]
    pub cache_max_size: usize,

    /// Allowed clock drift when checking `exp`, in seconds (default: 5)
    #[serde(default = "default_clock_skew")]
    pub clock_skew_secs: u64,

    /// JWKS key cache refresh interval in seconds (default: 600)
    #[serde(default = "default_jwks_refresh")]
    pub jwks_refresh_secs: u64,

    /// JWKS fetch timeout in milliseconds (default: 2000)
    #[serde(default = "default_jwks_timeout")]
    pub jwks_timeout_ms: u64,

    /// Shared-store URL for the revocation feed; absent disables it
    #[serde(default)]
    pub revocation_url: Option<String>,

    /// Channel publishing revoked-token fingerprints
    #[serde(default = "default_revocation_channel")]
    pub revocation_channel: String,
}

fn default_cache_ttl() -> u64 {
    300
}

fn default_cache_max_size() -> usize {
    10_000
}

fn default_clock_skew() -> u64 {
    5
}

fn default_jwks_refresh() -> u64 {
    600
}

fn default_jwks_timeout() -> u64 {
    2000
}

fn default_revocation_channel() -> String {
    "pylon:revocations".to_string()
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            issuer: String::new(),
            jwks_url: String::new(),
            ignore_paths: Vec::new(),
            cache_ttl_secs: default_cache_ttl(),
            cache_max_size: default_cache_max_size(),
            clock_skew_secs: default_clock_skew(),
            jwks_refresh_secs: default_jwks_refresh(),
            jwks_timeout_ms: default_jwks_timeout(),
            revocation_url: None,
            revocation_channel: default_revocation_channel(),
        }
    }
}

impl JwtConfig {
    /// Validate the section; only checked when the stage is enabled
    pub fn validate(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        if self.issuer.is_empty() {
            return Err(GatewayError::Config(
                "jwt.issuer is required when jwt is enabled".to_string(),
            ));
        }
        if self.jwks_url.is_empty() {
            return Err(GatewayError::Config(
                "jwt.jwks_url is required when jwt is enabled".to_string(),
            ));
        }
        if self.cache_max_size == 0 {
            return Err(GatewayError::Config(
                "jwt.cache_max_size must be greater than zero".to_string(),
            ));
        }
        if self.revocation_url.as_deref() == Some("") {
            return Err(GatewayError::Config(
                "jwt.revocation_url must not be empty".to_string(),
            ));
        }
        if self.revocation_url.is_some() && self.revocation_channel.is_empty() {
            return Err(GatewayError::Config(
                "jwt.revocation_channel must not be empty".to_string(),
            ));
        }
        IgnoreList::parse(&self.ignore_paths)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_jwt_section() {
        let hcl = r#"
            enabled         = true
            issuer          = "https://id.example.com"
            jwks_url        = "https://id.example.com/jwks.json"
            ignore_paths    = ["/health", "/public/**"]
            clock_skew_secs = 3
        "#;
        let config: JwtConfig = hcl::from_str(hcl).unwrap();
        assert!(config.enabled);
        assert_eq!(config.issuer, "https://id.example.com");
        assert_eq!(config.ignore_paths.len(), 2);
        assert_eq!(config.clock_skew_secs, 3);
        // defaults fill in
        assert_eq!(config.cache_ttl_secs, 300);
        assert_eq!(config.cache_max_size, 10_000);
    }

    #[test]
    fn test_disabled_section_skips_validation() {
        let config = JwtConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_enabled_requires_issuer_and_jwks() {
        let config = JwtConfig {
            enabled: true,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = JwtConfig {
            enabled: true,
            issuer: "https://id.example.com".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_ignore_path_fails_fast() {
        let config = JwtConfig {
            enabled: true,
            issuer: "https://id.example.com".to_string(),
            jwks_url: "https://id.example.com/jwks.json".to_string(),
            ignore_paths: vec!["no-leading-slash".to_string()],
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_revocation_defaults() {
        let config = JwtConfig::default();
        assert!(config.revocation_url.is_none());
        assert_eq!(config.revocation_channel, "pylon:revocations");
    }

    #[test]
    fn test_revocation_channel_must_not_be_empty() {
        let config = JwtConfig {
            enabled: true,
            issuer: "i".to_string(),
            jwks_url: "u".to_string(),
            revocation_url: Some("redis://127.0.0.1:6379".to_string()),
            revocation_channel: String::new(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_cache_size_rejected() {
        let config = JwtConfig {
            enabled: true,
            issuer: "i".to_string(),
            jwks_url: "u".to_string(),
            cache_max_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
