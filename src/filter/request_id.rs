//! Request/trace ID assignment — first stage, never rejects

use crate::context::{FilterOutcome, RequestContext, REQUEST_ID_HEADER, TRACE_ID_HEADER};
use crate::error::Result;
use crate::filter::Filter;
use async_trait::async_trait;

/// Echoes caller-supplied IDs or assigns fresh ones
pub struct RequestIdFilter;

#[async_trait]
impl Filter for RequestIdFilter {
    async fn apply(&self, ctx: &mut RequestContext) -> Result<FilterOutcome> {
        let request_id = ctx
            .header(REQUEST_ID_HEADER)
            .map(str::to_string)
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let trace_id = ctx
            .header(TRACE_ID_HEADER)
            .map(str::to_string)
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| format!("{:032x}", uuid::Uuid::new_v4().as_u128()));

        ctx.request_id = Some(request_id);
        ctx.trace_id = Some(trace_id);
        Ok(FilterOutcome::Continue)
    }

    fn name(&self) -> &str {
        "request-id"
    }
}
