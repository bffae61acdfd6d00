//! Gray routing rules — compiled matchers over request attributes

use crate::config::GrayRuleConfig;
use crate::context::RequestContext;
use crate::error::{GatewayError, Result};
use crate::gray::ip_matcher::CidrMatcher;

/// One predicate over a request
#[derive(Debug, Clone)]
pub enum GrayMatcher {
    /// Header equals value
    HeaderExact { name: String, value: String },
    /// Header starts with prefix
    HeaderPrefix { name: String, prefix: String },
    /// Cookie equals value
    Cookie { name: String, value: String },
    /// Query parameter equals value
    QueryParam { name: String, value: String },
    /// Authenticated user (or `X-User-Id` header) in the allowlist
    UserIn(Vec<String>),
    /// Client IP inside one of the ranges
    IpRange(CidrMatcher),
}

impl GrayMatcher {
    fn matches(&self, ctx: &RequestContext) -> bool {
        match self {
            Self::HeaderExact { name, value } => ctx.header(name) == Some(value.as_str()),
            Self::HeaderPrefix { name, prefix } => ctx
                .header(name)
                .is_some_and(|v| v.starts_with(prefix.as_str())),
            Self::Cookie { name, value } => ctx.cookie(name) == Some(value.as_str()),
            Self::QueryParam { name, value } => {
                ctx.query_param(name).as_deref() == Some(value.as_str())
            }
            Self::UserIn(allowlist) => {
                let user = ctx
                    .subject
                    .as_deref()
                    .or_else(|| ctx.header("x-user-id"));
                user.is_some_and(|u| allowlist.iter().any(|a| a == u))
            }
            Self::IpRange(matcher) => matcher.contains(&ctx.client_ip),
        }
    }
}

/// A compiled rule: priority, one matcher, optional version tag
#[derive(Debug, Clone)]
pub struct GrayRule {
    /// Rule name, for logs and diagnostics
    pub name: String,
    /// Evaluation priority; higher runs first
    pub priority: i64,
    matcher: GrayMatcher,
    /// Version tag the matching traffic is pinned to
    pub version: Option<String>,
}

impl GrayRule {
    /// Compile a configured rule.
    ///
    /// Exactly one matcher kind must be set; anything else is a
    /// configuration error.
    pub fn from_config(name: &str, config: &GrayRuleConfig) -> Result<Self> {
        if config.matcher_count() != 1 {
            return Err(GatewayError::Config(format!(
                "Gray rule '{}' must define exactly one matcher, found {}",
                name,
                config.matcher_count()
            )));
        }

        let matcher = if let Some(header) = &config.header {
            match (&config.header_value, &config.header_prefix) {
                (Some(value), None) => GrayMatcher::HeaderExact {
                    name: header.clone(),
                    value: value.clone(),
                },
                (None, Some(prefix)) => GrayMatcher::HeaderPrefix {
                    name: header.clone(),
                    prefix: prefix.clone(),
                },
                _ => {
                    return Err(GatewayError::Config(format!(
                        "Gray rule '{}' header matcher needs exactly one of 'header_value' or 'header_prefix'",
                        name
                    )))
                }
            }
        } else if let Some(cookie) = &config.cookie {
            let value = config.cookie_value.clone().ok_or_else(|| {
                GatewayError::Config(format!(
                    "Gray rule '{}' cookie matcher needs 'cookie_value'",
                    name
                ))
            })?;
            GrayMatcher::Cookie {
                name: cookie.clone(),
                value,
            }
        } else if let Some(query) = &config.query {
            let value = config.query_value.clone().ok_or_else(|| {
                GatewayError::Config(format!(
                    "Gray rule '{}' query matcher needs 'query_value'",
                    name
                ))
            })?;
            GrayMatcher::QueryParam {
                name: query.clone(),
                value,
            }
        } else if !config.user_ids.is_empty() {
            GrayMatcher::UserIn(config.user_ids.clone())
        } else {
            GrayMatcher::IpRange(CidrMatcher::new(&config.ip_ranges)?)
        };

        Ok(Self {
            name: name.to_string(),
            priority: config.priority,
            matcher,
            version: config.version.clone(),
        })
    }

    /// Whether this rule's matcher is satisfied by the request
    pub fn matches(&self, ctx: &RequestContext) -> bool {
        self.matcher.matches(ctx)
    }
}
