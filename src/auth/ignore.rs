//! Path patterns for validation bypass
//!
//! Requests matching a configured pattern skip JWT validation entirely and
//! proceed anonymous. Patterns match whole path segments: `*` matches one
//! segment, a trailing `**` matches any remainder.

use crate::error::{GatewayError, Result};

/// A compiled ignore-path pattern
#[derive(Debug, Clone)]
pub struct PathPattern {
    segments: Vec<Segment>,
    /// Trailing `**` — matches any (possibly empty) remainder
    open_ended: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    /// `*` — exactly one segment
    Wildcard,
}

impl PathPattern {
    /// Parse a pattern such as `/health`, `/public/*` or `/docs/**`
    pub fn parse(pattern: &str) -> Result<Self> {
        if !pattern.starts_with('/') {
            return Err(GatewayError::Config(format!(
                "Ignore path '{}' must start with '/'",
                pattern
            )));
        }

        let raw: Vec<&str> = pattern[1..].split('/').collect();
        let mut segments = Vec::new();
        let mut open_ended = false;

        for (i, part) in raw.iter().enumerate() {
            match *part {
                "**" => {
                    if i != raw.len() - 1 {
                        return Err(GatewayError::Config(format!(
                            "'**' is only valid at the end of ignore path '{}'",
                            pattern
                        )));
                    }
                    open_ended = true;
                }
                "*" => segments.push(Segment::Wildcard),
                literal => segments.push(Segment::Literal(literal.to_string())),
            }
        }

        Ok(Self {
            segments,
            open_ended,
        })
    }

    /// Whether a request path matches this pattern
    pub fn matches(&self, path: &str) -> bool {
        let path = path.strip_prefix('/').unwrap_or(path);
        let parts: Vec<&str> = if path.is_empty() {
            vec![]
        } else {
            path.split('/').collect()
        };

        if self.open_ended {
            if parts.len() < self.segments.len() {
                return false;
            }
        } else if parts.len() != self.segments.len() {
            return false;
        }

        self.segments.iter().zip(parts.iter()).all(|(seg, part)| match seg {
            Segment::Literal(lit) => lit == part,
            Segment::Wildcard => true,
        })
    }
}

/// The configured set of bypass patterns
#[derive(Debug, Clone, Default)]
pub struct IgnoreList {
    patterns: Vec<PathPattern>,
}

impl IgnoreList {
    /// Compile a list of patterns, failing fast on the first invalid one
    pub fn parse(patterns: &[String]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| PathPattern::parse(p))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// Whether any pattern matches the path
    pub fn matches(&self, path: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(path))
    }

    /// Whether the list has no patterns
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
