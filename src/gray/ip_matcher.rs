//! CIDR membership matching for gray rules

use crate::error::{GatewayError, Result};
use ipnet::IpNet;
use std::net::IpAddr;

/// Matcher over a set of CIDR ranges and single addresses.
///
/// Single addresses are stored as full-length prefixes, so one list handles
/// both forms, IPv4 and IPv6 alike.
#[derive(Debug, Clone)]
pub struct CidrMatcher {
    networks: Vec<IpNet>,
}

impl CidrMatcher {
    /// Parse a list of CIDR/IP entries
    pub fn new(entries: &[String]) -> Result<Self> {
        let mut networks = Vec::with_capacity(entries.len());

        for entry in entries {
            let trimmed = entry.trim();
            let net = if trimmed.contains('/') {
                trimmed.parse::<IpNet>().map_err(|e| {
                    GatewayError::Config(format!("Invalid CIDR '{}': {}", trimmed, e))
                })?
            } else {
                let ip: IpAddr = trimmed.parse().map_err(|e| {
                    GatewayError::Config(format!("Invalid IP address '{}': {}", trimmed, e))
                })?;
                IpNet::from(ip)
            };
            networks.push(net);
        }

        Ok(Self { networks })
    }

    /// Whether the given address string falls inside any range
    pub fn contains(&self, ip: &str) -> bool {
        let parsed: IpAddr = match ip.parse() {
            Ok(addr) => addr,
            Err(_) => return false,
        };
        self.networks.iter().any(|net| net.contains(&parsed))
    }

    /// Whether no ranges are configured
    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }
}
