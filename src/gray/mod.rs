//! Gray-release routing — staged rollout by rule and weight

pub mod ip_matcher;
pub mod router;
pub mod rule;

pub use ip_matcher::CidrMatcher;
pub use router::{GrayRouter, GraySettings};
pub use rule::{GrayMatcher, GrayRule};
