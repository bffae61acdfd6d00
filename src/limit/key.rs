//! Rate-limit key resolution
//!
//! A key is resolved from the request by a configured chain of strategies;
//! the first strategy that produces a subject wins. The chain is
//! configuration, not hardcoded order, but the default chain is
//! user → ip → path → tenant.

use crate::context::RequestContext;
use crate::error::{GatewayError, Result};

/// A resolved limiter key: logical bucket plus resolved subject.
///
/// Shards both the local map and the distributed store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey {
    /// Logical bucket name (one bucket per limiter instance)
    pub bucket: String,
    /// Resolved subject (user ID, IP, path or tenant)
    pub subject: String,
}

impl RateLimitKey {
    /// Key under which this entry is stored, shared-store and local alike
    pub fn storage_key(&self, prefix: &str) -> String {
        format!("{}:{}:{}", prefix, self.bucket, self.subject)
    }
}

/// One way of deriving a limiter subject from a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStrategy {
    /// Authenticated subject, when the validator ran first
    User,
    /// Client IP
    Ip,
    /// Request path
    Path,
    /// Tenant ID from claims or the `X-Tenant-Id` header
    Tenant,
}

impl KeyStrategy {
    /// Parse a configured strategy name
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "user" => Ok(Self::User),
            "ip" => Ok(Self::Ip),
            "path" => Ok(Self::Path),
            "tenant" => Ok(Self::Tenant),
            other => Err(GatewayError::Config(format!(
                "Unknown rate-limit key strategy '{}'",
                other
            ))),
        }
    }

    /// The default resolution chain
    pub fn default_chain() -> Vec<Self> {
        vec![Self::User, Self::Ip, Self::Path, Self::Tenant]
    }

    fn resolve(&self, ctx: &RequestContext) -> Option<String> {
        match self {
            Self::User => ctx.subject.clone().filter(|s| !s.is_empty()),
            Self::Ip => {
                if ctx.client_ip.is_empty() {
                    None
                } else {
                    Some(ctx.client_ip.clone())
                }
            }
            Self::Path => Some(ctx.path.clone()),
            Self::Tenant => ctx
                .tenant
                .clone()
                .or_else(|| ctx.header("x-tenant-id").map(str::to_string))
                .filter(|t| !t.is_empty()),
        }
    }
}

/// Resolve a key by walking the strategy chain.
///
/// The path strategy always resolves, so any chain containing it is total;
/// an exhausted chain falls back to the path to stay deterministic.
pub fn resolve_key(
    strategies: &[KeyStrategy],
    bucket: &str,
    ctx: &RequestContext,
) -> RateLimitKey {
    let subject = strategies
        .iter()
        .find_map(|s| s.resolve(ctx))
        .unwrap_or_else(|| ctx.path.clone());
    RateLimitKey {
        bucket: bucket.to_string(),
        subject,
    }
}
