//! JWT validation — signature verification with a verified-claims cache
//!
//! On a cache hit no cryptographic work is performed. Verification failures
//! map onto [`AuthError`]; an unreachable key source surfaces as
//! `GatewayError::Upstream` so the pipeline can apply its own policy.

use crate::auth::cache::CredentialCache;
use crate::auth::claims::JwtClaims;
use crate::auth::jwks::KeySource;
use crate::error::{AuthError, Result};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Validation};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Validator for `Authorization: Bearer <token>` credentials
pub struct JwtValidator {
    cache: Arc<CredentialCache>,
    keys: Arc<dyn KeySource>,
    issuer: String,
    clock_skew: Duration,
    cache_ttl: Duration,
    /// Signature verifications performed (cache misses only)
    verifications: AtomicU64,
}

impl JwtValidator {
    /// Create a validator backed by a claims cache and a key source
    pub fn new(
        cache: Arc<CredentialCache>,
        keys: Arc<dyn KeySource>,
        issuer: impl Into<String>,
        clock_skew: Duration,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            cache,
            keys,
            issuer: issuer.into(),
            clock_skew,
            cache_ttl,
            verifications: AtomicU64::new(0),
        }
    }

    /// Number of cryptographic verifications performed so far
    pub fn verification_count(&self) -> u64 {
        self.verifications.load(Ordering::Relaxed)
    }

    /// The claims cache backing this validator
    pub fn cache(&self) -> &Arc<CredentialCache> {
        &self.cache
    }

    /// Validate a raw `Authorization` header value.
    ///
    /// Returns verified claims, or `GatewayError::Auth` for credential
    /// failures and `GatewayError::Upstream` when the key source is
    /// unreachable.
    pub async fn validate(&self, authorization: Option<&str>) -> Result<JwtClaims> {
        let token = extract_bearer(authorization).ok_or(AuthError::Malformed)?;
        let fingerprint = CredentialCache::fingerprint(token);
        let now = chrono::Utc::now().timestamp();
        let skew = self.clock_skew.as_secs() as i64;

        if let Some(claims) = self.cache.get(&fingerprint) {
            // Expiry is re-checked on every hit; the cache TTL never
            // outlives the token but skew can leave a short tail.
            if claims.is_expired(now, skew) {
                self.cache.revoke(&fingerprint);
                return Err(AuthError::Expired.into());
            }
            return Ok(claims);
        }

        let header = decode_header(token).map_err(|_| AuthError::Malformed)?;
        let key = self.keys.verification_key(header.kid.as_deref()).await?;

        self.verifications.fetch_add(1, Ordering::Relaxed);

        let mut validation = Validation::new(key.algorithm);
        validation.leeway = self.clock_skew.as_secs();
        // Don't validate aud; issuer equality and expiry are the contract
        validation.validate_aud = false;
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss"]);

        let claims = decode::<JwtClaims>(token, &key.key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                ErrorKind::InvalidIssuer => AuthError::IssuerMismatch,
                ErrorKind::MissingRequiredClaim(claim) if claim.as_str() == "iss" => {
                    AuthError::IssuerMismatch
                }
                ErrorKind::MissingRequiredClaim(_)
                | ErrorKind::Base64(_)
                | ErrorKind::Json(_)
                | ErrorKind::Utf8(_) => AuthError::Malformed,
                _ => AuthError::InvalidSignature,
            })?;

        if claims.exp <= claims.iat {
            return Err(AuthError::Malformed.into());
        }

        // Never cache beyond the token's own validity
        let ttl = Duration::from_secs(claims.remaining_validity(now)).min(self.cache_ttl);
        self.cache.insert(fingerprint, claims.clone(), ttl);

        Ok(claims)
    }
}

/// Extract the token from a `Bearer <token>` header value
fn extract_bearer(authorization: Option<&str>) -> Option<&str> {
    let token = authorization?.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::auth::jwks::VerificationKey;
    use crate::error::GatewayError;
    use async_trait::async_trait;
    use jsonwebtoken::{encode, Algorithm, DecodingKey, EncodingKey, Header};
    use serde_json::json;

    pub(crate) const TEST_SECRET: &[u8] = b"unit-test-signing-secret";
    const TEST_ISSUER: &str = "https://id.example.com";

    /// Key source with a fixed symmetric key, for tests
    pub(crate) struct StaticKeySource;

    #[async_trait]
    impl KeySource for StaticKeySource {
        async fn verification_key(&self, _kid: Option<&str>) -> Result<VerificationKey> {
            Ok(VerificationKey {
                key: DecodingKey::from_secret(TEST_SECRET),
                algorithm: Algorithm::HS256,
            })
        }
    }

    /// Key source that is always unreachable, for tests
    struct DownKeySource;

    #[async_trait]
    impl KeySource for DownKeySource {
        async fn verification_key(&self, _kid: Option<&str>) -> Result<VerificationKey> {
            Err(GatewayError::Upstream("connection refused".to_string()))
        }
    }

    pub(crate) fn make_token(sub: &str, iss: &str, iat: i64, exp: i64) -> String {
        let claims = json!({
            "sub": sub,
            "username": sub,
            "iss": iss,
            "roles": ["user"],
            "tenant_id": "acme",
            "iat": iat,
            "exp": exp,
        });
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(TEST_SECRET),
        )
        .unwrap()
    }

    fn validator() -> JwtValidator {
        JwtValidator::new(
            Arc::new(CredentialCache::new(100)),
            Arc::new(StaticKeySource),
            TEST_ISSUER,
            Duration::from_secs(5),
            Duration::from_secs(300),
        )
    }

    fn valid_token() -> String {
        let now = chrono::Utc::now().timestamp();
        make_token("user-1", TEST_ISSUER, now - 10, now + 3600)
    }

    fn assert_auth_err(result: Result<JwtClaims>, expected: AuthError) {
        match result {
            Err(GatewayError::Auth(e)) => assert_eq!(e, expected),
            other => panic!("Expected {:?}, got {:?}", expected, other.map(|c| c.sub)),
        }
    }

    // --- Header shape ---

    #[tokio::test]
    async fn test_missing_header_is_malformed() {
        assert_auth_err(validator().validate(None).await, AuthError::Malformed);
    }

    #[tokio::test]
    async fn test_non_bearer_is_malformed() {
        let v = validator();
        assert_auth_err(
            v.validate(Some("Basic dXNlcjpwYXNz")).await,
            AuthError::Malformed,
        );
        assert_auth_err(v.validate(Some("Bearer ")).await, AuthError::Malformed);
        assert_auth_err(v.validate(Some("token123")).await, AuthError::Malformed);
    }

    #[tokio::test]
    async fn test_garbage_token_is_malformed() {
        assert_auth_err(
            validator().validate(Some("Bearer not.a.jwt!")).await,
            AuthError::Malformed,
        );
    }

    // --- Verification outcomes ---

    #[tokio::test]
    async fn test_valid_token_returns_claims() {
        let v = validator();
        let header = format!("Bearer {}", valid_token());
        let claims = v.validate(Some(&header)).await.unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.roles, vec!["user"]);
        assert_eq!(claims.tenant.as_deref(), Some("acme"));
    }

    #[tokio::test]
    async fn test_expired_token_rejected() {
        let v = validator();
        let now = chrono::Utc::now().timestamp();
        let token = make_token("user-1", TEST_ISSUER, now - 7200, now - 3600);
        assert_auth_err(
            v.validate(Some(&format!("Bearer {}", token))).await,
            AuthError::Expired,
        );
    }

    #[tokio::test]
    async fn test_issuer_mismatch_rejected() {
        let v = validator();
        let now = chrono::Utc::now().timestamp();
        let token = make_token("user-1", "https://rogue.example.com", now, now + 3600);
        assert_auth_err(
            v.validate(Some(&format!("Bearer {}", token))).await,
            AuthError::IssuerMismatch,
        );
    }

    #[tokio::test]
    async fn test_bad_signature_rejected() {
        let v = validator();
        let now = chrono::Utc::now().timestamp();
        let claims = json!({"sub": "x", "iss": TEST_ISSUER, "iat": now, "exp": now + 3600});
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"some-other-secret"),
        )
        .unwrap();
        assert_auth_err(
            v.validate(Some(&format!("Bearer {}", token))).await,
            AuthError::InvalidSignature,
        );
    }

    #[tokio::test]
    async fn test_missing_required_claims() {
        let v = validator();
        let now = chrono::Utc::now().timestamp();

        // No exp at all: structurally invalid
        let claims = json!({"sub": "x", "iss": TEST_ISSUER, "iat": now});
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(TEST_SECRET),
        )
        .unwrap();
        assert_auth_err(
            v.validate(Some(&format!("Bearer {}", token))).await,
            AuthError::Malformed,
        );

        // No iss: indistinguishable from a wrong issuer
        let claims = json!({"sub": "x", "iat": now, "exp": now + 3600});
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(TEST_SECRET),
        )
        .unwrap();
        assert_auth_err(
            v.validate(Some(&format!("Bearer {}", token))).await,
            AuthError::IssuerMismatch,
        );
    }

    #[tokio::test]
    async fn test_exp_before_iat_is_malformed() {
        let v = validator();
        let now = chrono::Utc::now().timestamp();
        let token = make_token("user-1", TEST_ISSUER, now + 3600, now + 1800);
        // exp in the future so signature validation passes, but exp <= iat
        assert_auth_err(
            v.validate(Some(&format!("Bearer {}", token))).await,
            AuthError::Malformed,
        );
    }

    #[tokio::test]
    async fn test_key_source_down_is_upstream_error() {
        let v = JwtValidator::new(
            Arc::new(CredentialCache::new(100)),
            Arc::new(DownKeySource),
            TEST_ISSUER,
            Duration::from_secs(5),
            Duration::from_secs(300),
        );
        let header = format!("Bearer {}", valid_token());
        let err = v.validate(Some(&header)).await.unwrap_err();
        assert!(matches!(err, GatewayError::Upstream(_)));
    }

    // --- Cache behavior ---

    #[tokio::test]
    async fn test_second_validation_hits_cache() {
        let v = validator();
        let header = format!("Bearer {}", valid_token());

        let first = v.validate(Some(&header)).await.unwrap();
        let second = v.validate(Some(&header)).await.unwrap();

        assert_eq!(first.sub, second.sub);
        assert_eq!(first.exp, second.exp);
        assert_eq!(v.verification_count(), 1);
    }

    #[tokio::test]
    async fn test_revocation_forces_reverification() {
        let v = validator();
        let token = valid_token();
        let header = format!("Bearer {}", token);

        v.validate(Some(&header)).await.unwrap();
        assert_eq!(v.verification_count(), 1);

        let fp = CredentialCache::fingerprint(&token);
        assert!(v.cache().revoke(&fp));

        v.validate(Some(&header)).await.unwrap();
        assert_eq!(v.verification_count(), 2);
    }

    #[tokio::test]
    async fn test_distinct_tokens_verify_separately() {
        let v = validator();
        let now = chrono::Utc::now().timestamp();
        let a = make_token("user-a", TEST_ISSUER, now, now + 3600);
        let b = make_token("user-b", TEST_ISSUER, now, now + 3600);

        v.validate(Some(&format!("Bearer {}", a))).await.unwrap();
        v.validate(Some(&format!("Bearer {}", b))).await.unwrap();
        assert_eq!(v.verification_count(), 2);
    }

    // --- Bearer extraction ---

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer(Some("Bearer abc")), Some("abc"));
        assert_eq!(extract_bearer(Some("Bearer  abc ")), Some("abc"));
        assert_eq!(extract_bearer(Some("bearer abc")), None);
        assert_eq!(extract_bearer(Some("abc")), None);
        assert_eq!(extract_bearer(None), None);
    }
}
