//! Per-request context threaded through the filter pipeline
//!
//! Replaces ambient thread-local state with an explicit value: created once
//! at pipeline entry, owned by that invocation, discarded with the response.

use http::{HeaderMap, Method, StatusCode};
use std::time::Instant;

/// Inbound header carrying a caller-supplied request ID
pub const REQUEST_ID_HEADER: &str = "x-request-id";
/// Inbound header carrying a caller-supplied trace ID
pub const TRACE_ID_HEADER: &str = "x-trace-id";

/// Context for a single request traversing the pipeline
#[derive(Debug)]
pub struct RequestContext {
    /// HTTP method
    pub method: Method,
    /// Request path (no query string)
    pub path: String,
    /// Raw query string, if any
    pub query: Option<String>,
    /// Client IP as resolved from forwarding headers or the socket peer
    pub client_ip: String,
    /// Inbound request headers
    pub headers: HeaderMap,
    /// Arrival timestamp
    pub received_at: Instant,

    /// Request ID — echoed from `X-Request-Id` or assigned by the pipeline
    pub request_id: Option<String>,
    /// Trace ID — echoed from `X-Trace-Id` or assigned by the pipeline
    pub trace_id: Option<String>,

    /// Authenticated subject, set by the JWT validator on success
    pub subject: Option<String>,
    /// Roles of the authenticated subject, in token order
    pub roles: Vec<String>,
    /// Tenant of the authenticated subject, if the token carries one
    pub tenant: Option<String>,

    /// Diagnostic headers stages attach to the eventual response
    /// (e.g. rate-limit remaining, degraded-mode marker)
    pub response_headers: Vec<(&'static str, String)>,
}

impl RequestContext {
    /// Create a context for a request
    pub fn new(
        method: Method,
        path: impl Into<String>,
        query: Option<String>,
        client_ip: impl Into<String>,
        headers: HeaderMap,
    ) -> Self {
        Self {
            method,
            path: path.into(),
            query,
            client_ip: client_ip.into(),
            headers,
            received_at: Instant::now(),
            request_id: None,
            trace_id: None,
            subject: None,
            roles: Vec::new(),
            tenant: None,
            response_headers: Vec::new(),
        }
    }

    /// Get a header value as a string, if present and valid UTF-8
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Get a cookie value from the `Cookie` header
    pub fn cookie(&self, name: &str) -> Option<&str> {
        let raw = self.header("cookie")?;
        for pair in raw.split(';') {
            let mut parts = pair.trim().splitn(2, '=');
            if parts.next() == Some(name) {
                return parts.next();
            }
        }
        None
    }

    /// Get a query parameter value (URL-decoded)
    pub fn query_param(&self, name: &str) -> Option<String> {
        let query = self.query.as_deref()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }
}

/// Resolve the client IP from forwarding headers, falling back to the
/// socket peer address.
///
/// `X-Forwarded-For` may carry a comma-separated chain; the first entry is
/// the originating client.
pub fn resolve_client_ip(headers: &HeaderMap, peer: &str) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            let trimmed = first.trim();
            if !trimmed.is_empty() {
                return trimmed.to_string();
            }
        }
    }
    if let Some(real_ip) = headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
        let trimmed = real_ip.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    peer.to_string()
}

/// Routing destination produced by the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteTarget {
    /// The stable backend group
    Stable,
    /// The gray backend group, optionally pinned to a version tag
    Gray {
        /// Version tag carried by the matching rule, if any
        version: Option<String>,
    },
}

impl RouteTarget {
    /// Group label used in decision headers and logs
    pub fn group(&self) -> &'static str {
        match self {
            Self::Stable => "stable",
            Self::Gray { .. } => "gray",
        }
    }
}

/// Outcome of a single filter stage.
///
/// Terminal once `Reject` or `RouteTo` is produced; `Continue` lets the
/// next stage run.
#[derive(Debug)]
pub enum FilterOutcome {
    /// Proceed to the next stage
    Continue,
    /// Short-circuit with a terminal response
    Reject {
        /// Response status
        status: StatusCode,
        /// Human-readable reason, returned in the JSON body
        reason: String,
        /// Stage-specific response headers (e.g. `Retry-After`)
        headers: Vec<(&'static str, String)>,
    },
    /// Terminal routing decision
    RouteTo {
        /// Resolved destination
        target: RouteTarget,
    },
}
