//! Gray-routing stage — the terminal routing decision

use crate::context::{FilterOutcome, RequestContext};
use crate::error::Result;
use crate::filter::Filter;
use crate::gray::GrayRouter;
use async_trait::async_trait;
use std::sync::Arc;

/// Resolves the backend group for the request
pub struct GrayFilter {
    router: Arc<GrayRouter>,
}

impl GrayFilter {
    /// Create the stage
    pub fn new(router: Arc<GrayRouter>) -> Self {
        Self { router }
    }
}

#[async_trait]
impl Filter for GrayFilter {
    async fn apply(&self, ctx: &mut RequestContext) -> Result<FilterOutcome> {
        let target = self.router.route(ctx);
        Ok(FilterOutcome::RouteTo { target })
    }

    fn name(&self) -> &str {
        "gray-router"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GrayConfig;
    use crate::context::RouteTarget;
    use http::{HeaderMap, Method};
    use std::collections::HashMap;

    #[tokio::test]
    async fn test_routing_is_terminal() {
        let config = GrayConfig {
            enabled: true,
            weight: 0,
            rules: HashMap::new(),
        };
        let f = GrayFilter::new(Arc::new(GrayRouter::from_config(&config).unwrap()));
        let mut ctx =
            RequestContext::new(Method::GET, "/api/data", None, "127.0.0.1", HeaderMap::new());
        match f.apply(&mut ctx).await.unwrap() {
            FilterOutcome::RouteTo { target } => assert_eq!(target, RouteTarget::Stable),
            other => panic!("Expected routing decision, got {:?}", other),
        }
    }
}
