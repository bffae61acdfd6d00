//! Rate-limit stage
//!
//! Admitted requests record remaining-token and degraded-mode diagnostics
//! for the response; rejections answer 429 with a `Retry-After` computed
//! from the bucket deficit, never a constant.

use crate::context::{FilterOutcome, RequestContext};
use crate::error::Result;
use crate::filter::Filter;
use crate::limit::{RateDecision, RateLimitCoordinator};
use async_trait::async_trait;
use http::StatusCode;
use std::sync::Arc;

/// Marker header set whenever the fallback tier decided
const DEGRADED_HEADER: &str = "x-ratelimit-degraded";

/// Admits or rejects requests under the configured rate budget
pub struct RateLimitFilter {
    coordinator: Arc<RateLimitCoordinator>,
    cost: f64,
}

impl RateLimitFilter {
    /// Create the stage; each request costs one token
    pub fn new(coordinator: Arc<RateLimitCoordinator>) -> Self {
        Self {
            coordinator,
            cost: 1.0,
        }
    }

    /// The coordinator backing this stage
    pub fn coordinator(&self) -> &Arc<RateLimitCoordinator> {
        &self.coordinator
    }
}

#[async_trait]
impl Filter for RateLimitFilter {
    async fn apply(&self, ctx: &mut RequestContext) -> Result<FilterOutcome> {
        let key = self.coordinator.resolve(ctx);

        match self.coordinator.admit(&key, self.cost).await {
            RateDecision::Admitted {
                remaining,
                degraded,
            } => {
                ctx.response_headers
                    .push(("x-ratelimit-remaining", format!("{}", remaining.floor() as u64)));
                if degraded {
                    ctx.response_headers.push((DEGRADED_HEADER, "true".to_string()));
                }
                Ok(FilterOutcome::Continue)
            }
            RateDecision::Rejected {
                retry_after,
                degraded,
            } => {
                let mut headers = vec![(
                    "retry-after",
                    format!("{}", retry_after.ceil().max(1.0) as u64),
                )];
                if degraded {
                    headers.push((DEGRADED_HEADER, "true".to_string()));
                }
                Ok(FilterOutcome::Reject {
                    status: StatusCode::TOO_MANY_REQUESTS,
                    reason: "rate limit exceeded".to_string(),
                    headers,
                })
            }
        }
    }

    fn name(&self) -> &str {
        "rate-limit"
    }
}
