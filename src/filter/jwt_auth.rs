//! JWT authentication stage
//!
//! Paths on the ignore list pass through anonymous. Everything else must
//! present a verifiable Bearer token; failures answer 401 with a
//! `WWW-Authenticate` challenge, and an unreachable key source answers 503.

use crate::auth::{IgnoreList, JwtValidator};
use crate::context::{FilterOutcome, RequestContext};
use crate::error::{GatewayError, Result};
use crate::filter::Filter;
use async_trait::async_trait;
use http::StatusCode;
use std::sync::Arc;

/// Validates `Authorization: Bearer` credentials
pub struct JwtAuthFilter {
    validator: Arc<JwtValidator>,
    ignore: IgnoreList,
}

impl JwtAuthFilter {
    /// Create the stage
    pub fn new(validator: Arc<JwtValidator>, ignore: IgnoreList) -> Self {
        Self { validator, ignore }
    }

    /// The validator backing this stage
    pub fn validator(&self) -> &Arc<JwtValidator> {
        &self.validator
    }
}

#[async_trait]
impl Filter for JwtAuthFilter {
    async fn apply(&self, ctx: &mut RequestContext) -> Result<FilterOutcome> {
        if self.ignore.matches(&ctx.path) {
            tracing::debug!(path = %ctx.path, "Path on ignore list, skipping validation");
            return Ok(FilterOutcome::Continue);
        }

        let authorization = ctx.header("authorization").map(str::to_string);
        match self.validator.validate(authorization.as_deref()).await {
            Ok(claims) => {
                ctx.subject = Some(claims.sub);
                ctx.roles = claims.roles;
                ctx.tenant = claims.tenant;
                Ok(FilterOutcome::Continue)
            }
            Err(GatewayError::Auth(e)) => Ok(FilterOutcome::Reject {
                status: StatusCode::UNAUTHORIZED,
                reason: e.to_string(),
                headers: vec![(
                    "www-authenticate",
                    format!(r#"Bearer error="{}""#, e.code()),
                )],
            }),
            Err(GatewayError::Upstream(e)) => {
                tracing::warn!(error = %e, "Key source unavailable");
                Ok(FilterOutcome::Reject {
                    status: StatusCode::SERVICE_UNAVAILABLE,
                    reason: "key source unavailable".to_string(),
                    headers: Vec::new(),
                })
            }
            Err(e) => Err(e),
        }
    }

    fn name(&self) -> &str {
        "jwt-auth"
    }
}
