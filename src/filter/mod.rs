//! Filter pipeline — ordered request-time decisions
//!
//! Stages run in a fixed order, cheapest and most certain reject first:
//! ID assignment, authentication, admission, routing. The first terminal
//! outcome short-circuits the rest. The chain is assembled explicitly from
//! configuration at startup; disabled stages are simply never constructed.

mod gray;
mod jwt_auth;
mod rate_limit;
mod request_id;

pub use gray::GrayFilter;
pub use jwt_auth::JwtAuthFilter;
pub use rate_limit::RateLimitFilter;
pub use request_id::RequestIdFilter;

use crate::auth::{CredentialCache, IgnoreList, JwksClient, JwtValidator};
use crate::config::PipelineConfig;
use crate::context::{FilterOutcome, RequestContext, RouteTarget};
use crate::error::Result;
use crate::gray::GrayRouter;
use crate::limit::{BucketParams, DistributedLimiter, RateLimitCoordinator};
use async_trait::async_trait;
use http::{Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;

/// One pipeline stage
#[async_trait]
pub trait Filter: Send + Sync {
    /// Apply this stage to the request
    async fn apply(&self, ctx: &mut RequestContext) -> Result<FilterOutcome>;

    /// Stage name for logging
    fn name(&self) -> &str;
}

/// Terminal result of running the chain
#[derive(Debug)]
pub enum PipelineVerdict {
    /// Forward to the resolved backend group
    Forward {
        /// Routing decision
        target: RouteTarget,
    },
    /// Answer the client without forwarding
    Reject {
        /// Response status
        status: StatusCode,
        /// Reason, returned in the JSON body
        reason: String,
        /// Stage-specific response headers
        headers: Vec<(&'static str, String)>,
    },
}

/// Ordered chain of enabled stages
pub struct FilterChain {
    filters: Vec<Arc<dyn Filter>>,
    credential_cache: Option<Arc<CredentialCache>>,
    gray_router: Option<Arc<GrayRouter>>,
}

impl FilterChain {
    /// Assemble the chain from validated configuration.
    ///
    /// Stage order is fixed; configuration only decides which stages
    /// exist. Construction is explicit and happens exactly once.
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        config.validate()?;

        let mut filters: Vec<Arc<dyn Filter>> = vec![Arc::new(RequestIdFilter)];
        let mut credential_cache = None;
        let mut gray_router = None;

        if config.jwt.enabled {
            let cache = Arc::new(CredentialCache::new(config.jwt.cache_max_size));
            let keys = Arc::new(JwksClient::new(
                config.jwt.jwks_url.clone(),
                Duration::from_secs(config.jwt.jwks_refresh_secs),
                Duration::from_millis(config.jwt.jwks_timeout_ms),
            )?);
            let validator = JwtValidator::new(
                cache.clone(),
                keys,
                config.jwt.issuer.clone(),
                Duration::from_secs(config.jwt.clock_skew_secs),
                Duration::from_secs(config.jwt.cache_ttl_secs),
            );
            let ignore = IgnoreList::parse(&config.jwt.ignore_paths)?;
            credential_cache = Some(cache);
            filters.push(Arc::new(JwtAuthFilter::new(Arc::new(validator), ignore)));
        }

        if config.rate_limit.enabled {
            let params = BucketParams {
                capacity: config.rate_limit.capacity(),
                rate: config.rate_limit.default_rate,
            };
            let distributed = config
                .rate_limit
                .redis_url
                .as_deref()
                .map(DistributedLimiter::new)
                .transpose()?;
            let fallback = (distributed.is_some() && config.rate_limit.enable_fallback).then(|| {
                BucketParams {
                    capacity: config.rate_limit.capacity(),
                    rate: config.rate_limit.effective_fallback_rate(),
                }
            });
            let coordinator = RateLimitCoordinator::new(
                params,
                distributed,
                fallback,
                config.rate_limit.strategies()?,
                Duration::from_millis(config.rate_limit.timeout_ms),
            );
            filters.push(Arc::new(RateLimitFilter::new(Arc::new(coordinator))));
        }

        if config.gray.enabled {
            let router = Arc::new(GrayRouter::from_config(&config.gray)?);
            gray_router = Some(router.clone());
            filters.push(Arc::new(GrayFilter::new(router)));
        }

        Ok(Self {
            filters,
            credential_cache,
            gray_router,
        })
    }

    /// Run the request through every stage until one is terminal.
    ///
    /// A chain without a routing stage forwards to the stable group.
    pub async fn execute(&self, ctx: &mut RequestContext) -> PipelineVerdict {
        for filter in &self.filters {
            match filter.apply(ctx).await {
                Ok(FilterOutcome::Continue) => {}
                Ok(FilterOutcome::RouteTo { target }) => {
                    return PipelineVerdict::Forward { target };
                }
                Ok(FilterOutcome::Reject {
                    status,
                    reason,
                    headers,
                }) => {
                    tracing::debug!(
                        filter = filter.name(),
                        status = status.as_u16(),
                        reason = %reason,
                        "Filter short-circuited request"
                    );
                    return PipelineVerdict::Reject {
                        status,
                        reason,
                        headers,
                    };
                }
                Err(e) => {
                    tracing::error!(filter = filter.name(), error = %e, "Filter failed");
                    return PipelineVerdict::Reject {
                        status: StatusCode::INTERNAL_SERVER_ERROR,
                        reason: "internal error".to_string(),
                        headers: Vec::new(),
                    };
                }
            }
        }
        PipelineVerdict::Forward {
            target: RouteTarget::Stable,
        }
    }

    /// The claims cache, when the JWT stage is assembled (revocation feed)
    pub fn credential_cache(&self) -> Option<Arc<CredentialCache>> {
        self.credential_cache.clone()
    }

    /// The gray router, when the routing stage is assembled (live reload)
    pub fn gray_router(&self) -> Option<Arc<GrayRouter>> {
        self.gray_router.clone()
    }

    /// Number of assembled stages
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Whether no stages are assembled
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

/// Build the terminal HTTP response for a rejection.
///
/// Every rejection echoes the request and trace IDs alongside the
/// stage-specific headers.
pub fn reject_response(
    ctx: &RequestContext,
    status: StatusCode,
    reason: &str,
    headers: &[(&'static str, String)],
) -> Response<Vec<u8>> {
    let mut builder = Response::builder()
        .status(status)
        .header("content-type", "application/json");

    if let Some(id) = &ctx.request_id {
        builder = builder.header("x-request-id", id);
    }
    if let Some(id) = &ctx.trace_id {
        builder = builder.header("x-trace-id", id);
    }
    for (name, value) in headers {
        builder = builder.header(*name, value);
    }

    let body = format!(r#"{{"error":"{}"}}"#, reason).into_bytes();
    builder.body(body).unwrap_or_else(|_| {
        Response::new(br#"{"error":"internal error"}"#.to_vec())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::{HeaderMap, Method};

    fn ctx(path: &str) -> RequestContext {
        RequestContext::new(Method::GET, path, None, "127.0.0.1", HeaderMap::new())
    }

    fn base_config() -> PipelineConfig {
        PipelineConfig::default()
    }

    #[test]
    fn test_minimal_chain_has_only_id_stage() {
        let chain = FilterChain::from_config(&base_config()).unwrap();
        assert_eq!(chain.len(), 1);
        assert!(chain.credential_cache().is_none());
        assert!(chain.gray_router().is_none());
    }

    #[test]
    fn test_all_stages_assembled_in_order() {
        let mut config = base_config();
        config.jwt.enabled = true;
        config.jwt.issuer = "https://id.example.com".to_string();
        config.jwt.jwks_url = "https://id.example.com/jwks.json".to_string();
        config.rate_limit.enabled = true;
        config.gray.enabled = true;
        config.gray.weight = 10;

        let chain = FilterChain::from_config(&config).unwrap();
        assert_eq!(chain.len(), 4);
        assert!(chain.credential_cache().is_some());
        assert!(chain.gray_router().is_some());
    }

    #[test]
    fn test_invalid_config_fails_construction() {
        let mut config = base_config();
        config.jwt.enabled = true; // missing issuer / jwks_url
        assert!(FilterChain::from_config(&config).is_err());
    }

    #[tokio::test]
    async fn test_empty_pipeline_forwards_stable() {
        let chain = FilterChain::from_config(&base_config()).unwrap();
        let mut c = ctx("/api/data");
        match chain.execute(&mut c).await {
            PipelineVerdict::Forward { target } => assert_eq!(target, RouteTarget::Stable),
            other => panic!("Expected forward, got {:?}", other),
        }
        // ID stage always ran
        assert!(c.request_id.is_some());
        assert!(c.trace_id.is_some());
    }

    #[tokio::test]
    async fn test_gray_stage_decides_routing() {
        let mut config = base_config();
        config.gray.enabled = true;
        config.gray.weight = 100;
        let chain = FilterChain::from_config(&config).unwrap();

        let mut c = ctx("/api/data");
        match chain.execute(&mut c).await {
            PipelineVerdict::Forward { target } => {
                assert_eq!(target, RouteTarget::Gray { version: None })
            }
            other => panic!("Expected forward, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_rate_limit_rejects_before_gray() {
        let mut config = base_config();
        config.rate_limit.enabled = true;
        config.rate_limit.default_rate = 1.0;
        config.rate_limit.default_capacity = Some(1.0);
        config.gray.enabled = true;
        config.gray.weight = 100;
        let chain = FilterChain::from_config(&config).unwrap();

        let mut first = ctx("/api/data");
        assert!(matches!(
            chain.execute(&mut first).await,
            PipelineVerdict::Forward { .. }
        ));

        let mut second = ctx("/api/data");
        match chain.execute(&mut second).await {
            PipelineVerdict::Reject { status, headers, .. } => {
                assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
                assert!(headers.iter().any(|(name, _)| *name == "retry-after"));
            }
            other => panic!("Expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_reject_response_echoes_ids() {
        let mut c = ctx("/api/data");
        c.request_id = Some("req-1".to_string());
        c.trace_id = Some("trace-1".to_string());

        let resp = reject_response(
            &c,
            StatusCode::UNAUTHORIZED,
            "token expired",
            &[("www-authenticate", "Bearer".to_string())],
        );
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(resp.headers()["x-request-id"], "req-1");
        assert_eq!(resp.headers()["x-trace-id"], "trace-1");
        assert_eq!(resp.headers()["www-authenticate"], "Bearer");
        let body = String::from_utf8(resp.body().clone()).unwrap();
        assert!(body.contains("token expired"));
    }
}
