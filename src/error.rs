//! Centralized error types for the Pylon traffic pipeline

use thiserror::Error;

/// Authentication failures surfaced by the JWT validator.
///
/// Every variant maps to an HTTP 401 at the pipeline boundary; the variant
/// only changes the `WWW-Authenticate` error description.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Authorization header missing or not of the form `Bearer <token>`
    #[error("malformed authorization header")]
    Malformed,

    /// Signature could not be verified against the published key set
    #[error("invalid token signature")]
    InvalidSignature,

    /// Token `exp` has passed (beyond the configured clock skew)
    #[error("token expired")]
    Expired,

    /// Token `iss` does not match the configured issuer
    #[error("issuer mismatch")]
    IssuerMismatch,
}

impl AuthError {
    /// Short machine-readable code used in `WWW-Authenticate` responses
    pub fn code(&self) -> &'static str {
        match self {
            Self::Malformed => "invalid_request",
            Self::InvalidSignature => "invalid_token",
            Self::Expired => "token_expired",
            Self::IssuerMismatch => "issuer_mismatch",
        }
    }
}

/// Pipeline error types
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Invalid configuration — raised at startup, never at request time
    #[error("Configuration error: {0}")]
    Config(String),

    /// Authentication failure
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// A required external collaborator (key source, shared store) is
    /// unreachable and no fallback path is configured
    #[error("Upstream unavailable: {0}")]
    Upstream(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Shared-store operation failed
    #[error("Store error: {0}")]
    Store(#[from] redis::RedisError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, GatewayError>;
