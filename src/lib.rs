//! # Pylon Gateway
//!
//! The traffic-control pipeline of an API gateway: the ordered request-time
//! decisions that determine whether an inbound HTTP request is
//! authenticated, admitted under a rate budget, and routed to a stable or
//! gray backend.
//!
//! ## Architecture
//!
//! ```text
//! Request → RequestId → JwtValidator → RateLimitCoordinator → GrayRouter → decision
//! ```
//!
//! Each stage may short-circuit with a terminal response; normal requests
//! fall through to the routing decision.
//!
//! ## Core Features
//!
//! - **JWT validation**: JWKS-sourced keys, verified-claims cache with TTL
//!   and immediate revocation eviction
//! - **Hybrid rate limiting**: atomic distributed token buckets with a
//!   local fallback tier that degrades predictably when the store is down
//! - **Gray routing**: priority rules over headers, cookies, query
//!   parameters, users and CIDR ranges, with a weighted random fallback
//!   that reloads live
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pylon_gateway::{config::PipelineConfig, filter::FilterChain};
//!
//! #[tokio::main]
//! async fn main() -> pylon_gateway::Result<()> {
//!     let config = PipelineConfig::from_file("pylon.hcl").await?;
//!     let chain = std::sync::Arc::new(FilterChain::from_config(&config)?);
//!     pylon_gateway::entrypoint::serve(&config.listen, chain).await
//! }
//! ```

pub mod auth;
pub mod config;
pub mod context;
pub mod entrypoint;
pub mod error;
pub mod filter;
pub mod gray;
pub mod limit;

// Re-export main types
pub use context::{FilterOutcome, RequestContext, RouteTarget};
pub use error::{AuthError, GatewayError, Result};
pub use filter::{FilterChain, PipelineVerdict};
