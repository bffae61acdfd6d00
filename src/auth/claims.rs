//! Verified JWT claims

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Claims extracted from a verified token.
///
/// Derived once per unique token string and immutable after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID)
    #[serde(default)]
    pub sub: String,
    /// Display username, when the issuer includes one
    #[serde(default)]
    pub username: String,
    /// Issuer
    #[serde(default)]
    pub iss: String,
    /// Roles in token order
    #[serde(default)]
    pub roles: Vec<String>,
    /// Tenant the subject belongs to
    #[serde(default, rename = "tenant_id")]
    pub tenant: Option<String>,
    /// Issued at (UTC timestamp)
    #[serde(default)]
    pub iat: i64,
    /// Expiration time (UTC timestamp)
    #[serde(default)]
    pub exp: i64,
    /// Remaining claims the gateway does not interpret
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl JwtClaims {
    /// Whether the token has expired at `now`, allowing `skew_secs` of
    /// clock drift. Pure function of its inputs.
    pub fn is_expired(&self, now: i64, skew_secs: i64) -> bool {
        now > self.exp + skew_secs
    }

    /// Seconds of validity left at `now` (zero when already expired)
    pub fn remaining_validity(&self, now: i64) -> u64 {
        (self.exp - now).max(0) as u64
    }
}
