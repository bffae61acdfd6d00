//! Public-key source — JWKS fetch and per-kid key cache
//!
//! Fetches the issuer's JSON Web Key Set over HTTP and caches decoded
//! verification keys by `kid` with a refresh interval. The fetch is the
//! only suspension point; cached lookups are synchronous.

use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// A decoded verification key plus the algorithm it verifies
#[derive(Clone)]
pub struct VerificationKey {
    /// Decoding key material
    pub key: DecodingKey,
    /// Signature algorithm the key verifies
    pub algorithm: Algorithm,
}

// `DecodingKey` is not `Debug`, so derive is unavailable; the key material
// is deliberately omitted.
impl std::fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationKey")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

/// Source of verification keys, looked up by key ID.
///
/// Implemented by [`JwksClient`] in production; tests substitute a static
/// source.
#[async_trait]
pub trait KeySource: Send + Sync {
    /// Resolve the verification key for a token's `kid`.
    ///
    /// A `None` kid is accepted when the set contains exactly one key.
    async fn verification_key(&self, kid: Option<&str>) -> Result<VerificationKey>;
}

/// A single key as published in a JWKS document (subset of RFC 7517)
#[derive(Debug, Clone, Deserialize)]
pub struct Jwk {
    /// Key type ("RSA" or "oct")
    pub kty: String,
    /// Key ID
    #[serde(default)]
    pub kid: Option<String>,
    /// Declared algorithm
    #[serde(default)]
    pub alg: Option<String>,
    /// RSA modulus (base64url)
    #[serde(default)]
    pub n: Option<String>,
    /// RSA exponent (base64url)
    #[serde(default)]
    pub e: Option<String>,
    /// Symmetric key material (base64url), for "oct" keys
    #[serde(default)]
    pub k: Option<String>,
}

/// JWKS document
#[derive(Debug, Clone, Deserialize)]
pub struct JwkSet {
    /// Published keys
    pub keys: Vec<Jwk>,
}

impl Jwk {
    /// Decode this JWK into usable key material
    pub fn to_verification_key(&self) -> Result<VerificationKey> {
        let algorithm = match self.alg.as_deref() {
            Some(alg) => alg
                .parse::<Algorithm>()
                .map_err(|_| GatewayError::Config(format!("Unsupported JWK alg '{}'", alg)))?,
            None => match self.kty.as_str() {
                "RSA" => Algorithm::RS256,
                "oct" => Algorithm::HS256,
                other => {
                    return Err(GatewayError::Config(format!(
                        "Unsupported JWK key type '{}'",
                        other
                    )))
                }
            },
        };

        let key = match self.kty.as_str() {
            "RSA" => {
                let n = self.n.as_deref().ok_or_else(|| {
                    GatewayError::Config("RSA JWK missing 'n' component".to_string())
                })?;
                let e = self.e.as_deref().ok_or_else(|| {
                    GatewayError::Config("RSA JWK missing 'e' component".to_string())
                })?;
                DecodingKey::from_rsa_components(n, e)
                    .map_err(|e| GatewayError::Config(format!("Invalid RSA JWK: {}", e)))?
            }
            "oct" => {
                let k = self.k.as_deref().ok_or_else(|| {
                    GatewayError::Config("oct JWK missing 'k' component".to_string())
                })?;
                let secret = URL_SAFE_NO_PAD
                    .decode(k)
                    .map_err(|e| GatewayError::Config(format!("Invalid oct JWK: {}", e)))?;
                DecodingKey::from_secret(&secret)
            }
            other => {
                return Err(GatewayError::Config(format!(
                    "Unsupported JWK key type '{}'",
                    other
                )))
            }
        };

        Ok(VerificationKey { key, algorithm })
    }
}

/// HTTP JWKS client with a kid-indexed key cache
pub struct JwksClient {
    http: reqwest::Client,
    url: String,
    refresh_interval: Duration,
    keys: RwLock<HashMap<String, VerificationKey>>,
    last_refresh: RwLock<Option<Instant>>,
}

/// Map key under which a kid-less JWK is stored
const DEFAULT_KID: &str = "";

impl JwksClient {
    /// Create a client for a JWKS endpoint.
    ///
    /// `fetch_timeout` bounds each fetch; `refresh_interval` controls how
    /// long cached keys are trusted before a re-fetch.
    pub fn new(
        url: impl Into<String>,
        refresh_interval: Duration,
        fetch_timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(fetch_timeout)
            .build()
            .map_err(GatewayError::Http)?;
        Ok(Self {
            http,
            url: url.into(),
            refresh_interval,
            keys: RwLock::new(HashMap::new()),
            last_refresh: RwLock::new(None),
        })
    }

    fn cached(&self, kid: Option<&str>) -> Option<VerificationKey> {
        let keys = self.keys.read().unwrap_or_else(|e| e.into_inner());
        match kid {
            Some(kid) => keys.get(kid).cloned(),
            // No kid: unambiguous only when a single key is published
            None => {
                if keys.len() == 1 {
                    keys.values().next().cloned()
                } else {
                    keys.get(DEFAULT_KID).cloned()
                }
            }
        }
    }

    fn is_stale(&self) -> bool {
        let last = self.last_refresh.read().unwrap_or_else(|e| e.into_inner());
        match *last {
            Some(at) => at.elapsed() >= self.refresh_interval,
            None => true,
        }
    }

    /// Fetch the JWKS document and rebuild the key cache
    pub async fn refresh(&self) -> Result<()> {
        tracing::debug!(url = %self.url, "Fetching JWKS");
        let set: JwkSet = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| GatewayError::Upstream(format!("JWKS fetch failed: {}", e)))?
            .error_for_status()
            .map_err(|e| GatewayError::Upstream(format!("JWKS fetch failed: {}", e)))?
            .json()
            .await
            .map_err(|e| GatewayError::Upstream(format!("JWKS response invalid: {}", e)))?;

        let mut decoded = HashMap::new();
        for jwk in &set.keys {
            match jwk.to_verification_key() {
                Ok(key) => {
                    decoded.insert(jwk.kid.clone().unwrap_or_else(|| DEFAULT_KID.to_string()), key);
                }
                Err(e) => {
                    tracing::warn!(kid = ?jwk.kid, error = %e, "Skipping unusable JWK");
                }
            }
        }

        if decoded.is_empty() {
            return Err(GatewayError::Upstream(
                "JWKS document contains no usable keys".to_string(),
            ));
        }

        *self.keys.write().unwrap_or_else(|e| e.into_inner()) = decoded;
        *self.last_refresh.write().unwrap_or_else(|e| e.into_inner()) = Some(Instant::now());
        Ok(())
    }
}

#[async_trait]
impl KeySource for JwksClient {
    async fn verification_key(&self, kid: Option<&str>) -> Result<VerificationKey> {
        if !self.is_stale() {
            if let Some(key) = self.cached(kid) {
                return Ok(key);
            }
        }

        // Miss or stale cache: one bounded fetch, then a second lookup.
        // An unknown kid after a fresh fetch is a hard failure, not a retry.
        self.refresh().await?;

        self.cached(kid).ok_or_else(|| {
            GatewayError::Upstream(format!("No JWKS key for kid {:?}", kid))
        })
    }
}
