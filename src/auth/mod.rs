//! Authentication — JWT verification, claims caching, key sourcing

pub mod cache;
pub mod claims;
pub mod ignore;
pub mod jwks;
pub mod revocation;
pub mod validator;

pub use cache::CredentialCache;
pub use claims::JwtClaims;
pub use ignore::IgnoreList;
pub use jwks::{JwksClient, KeySource, VerificationKey};
pub use revocation::{spawn_revocation_listener, spawn_revocation_subscriber, RevocationSender};
pub use validator::JwtValidator;
