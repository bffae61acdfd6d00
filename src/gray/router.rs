//! Gray router — rule evaluation with weighted random fallback
//!
//! Rules run in descending priority; the first match decides. Requests no
//! rule claims are split by weight: a uniform draw in [0,100) below the
//! configured weight routes to gray. Settings are swapped atomically at
//! runtime, so weight changes apply without a restart.

use crate::config::GrayConfig;
use crate::context::{RequestContext, RouteTarget};
use crate::error::Result;
use crate::gray::rule::GrayRule;
use rand::Rng;
use std::sync::RwLock;

/// A compiled, immutable snapshot of the gray configuration
#[derive(Debug, Clone, Default)]
pub struct GraySettings {
    /// Percentage of unmatched traffic routed to gray, 0..=100
    pub weight: u32,
    /// Rules sorted by descending priority
    pub rules: Vec<GrayRule>,
}

impl GraySettings {
    /// Compile configuration into a snapshot, failing on any invalid rule
    pub fn from_config(config: &GrayConfig) -> Result<Self> {
        let mut rules = config
            .rules
            .iter()
            .map(|(name, rule)| GrayRule::from_config(name, rule))
            .collect::<Result<Vec<_>>>()?;
        rules.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.name.cmp(&b.name)));

        Ok(Self {
            weight: config.weight,
            rules,
        })
    }
}

/// Routes requests between the stable and gray backend groups
pub struct GrayRouter {
    settings: RwLock<GraySettings>,
}

impl GrayRouter {
    /// Create a router from a compiled snapshot
    pub fn new(settings: GraySettings) -> Self {
        Self {
            settings: RwLock::new(settings),
        }
    }

    /// Create a router straight from configuration
    pub fn from_config(config: &GrayConfig) -> Result<Self> {
        Ok(Self::new(GraySettings::from_config(config)?))
    }

    /// Swap in new settings without restarting
    pub fn reload(&self, settings: GraySettings) {
        let mut current = self.settings.write().unwrap_or_else(|e| e.into_inner());
        tracing::info!(
            weight = settings.weight,
            rules = settings.rules.len(),
            "Gray routing settings reloaded"
        );
        *current = settings;
    }

    /// Current traffic weight
    pub fn weight(&self) -> u32 {
        self.settings.read().unwrap_or_else(|e| e.into_inner()).weight
    }

    /// Resolve the routing target for a request
    pub fn route(&self, ctx: &RequestContext) -> RouteTarget {
        let settings = self.settings.read().unwrap_or_else(|e| e.into_inner());

        for rule in &settings.rules {
            if rule.matches(ctx) {
                tracing::debug!(rule = %rule.name, "Gray rule matched");
                return RouteTarget::Gray {
                    version: rule.version.clone(),
                };
            }
        }

        if settings.weight > 0 && rand::thread_rng().gen_range(0.0..100.0) < settings.weight as f64
        {
            RouteTarget::Gray { version: None }
        } else {
            RouteTarget::Stable
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GrayConfig, GrayRuleConfig};
    use http::{HeaderMap, HeaderValue, Method};
    use std::collections::HashMap;

    fn ctx() -> RequestContext {
        RequestContext::new(Method::GET, "/api/data", None, "10.0.0.1", HeaderMap::new())
    }

    fn config_with_weight(weight: u32) -> GrayConfig {
        GrayConfig {
            enabled: true,
            weight,
            rules: HashMap::new(),
        }
    }

    fn header_rule(priority: i64, value: &str, version: Option<&str>) -> GrayRuleConfig {
        GrayRuleConfig {
            priority,
            header: Some("x-gray-version".to_string()),
            header_value: Some(value.to_string()),
            version: version.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_weight_zero_routes_stable() {
        let router = GrayRouter::from_config(&config_with_weight(0)).unwrap();
        for _ in 0..100 {
            assert_eq!(router.route(&ctx()), RouteTarget::Stable);
        }
    }

    #[test]
    fn test_weight_hundred_routes_gray() {
        let router = GrayRouter::from_config(&config_with_weight(100)).unwrap();
        for _ in 0..100 {
            assert_eq!(router.route(&ctx()), RouteTarget::Gray { version: None });
        }
    }

    #[test]
    fn test_weight_converges_over_many_trials() {
        let router = GrayRouter::from_config(&config_with_weight(30)).unwrap();
        let trials = 20_000;
        let gray = (0..trials)
            .filter(|_| matches!(router.route(&ctx()), RouteTarget::Gray { .. }))
            .count();
        let share = gray as f64 * 100.0 / trials as f64;
        assert!(
            (share - 30.0).abs() < 3.0,
            "gray share {:.1}% too far from 30%",
            share
        );
    }

    #[test]
    fn test_matching_rule_overrides_weight() {
        let mut config = config_with_weight(0);
        config
            .rules
            .insert("beta".to_string(), header_rule(10, "v2", Some("v2")));
        let router = GrayRouter::from_config(&config).unwrap();

        let mut c = ctx();
        c.headers
            .insert("x-gray-version", HeaderValue::from_static("v2"));
        assert_eq!(
            router.route(&c),
            RouteTarget::Gray {
                version: Some("v2".to_string())
            }
        );
    }

    #[test]
    fn test_higher_priority_rule_wins() {
        let mut config = config_with_weight(0);
        config
            .rules
            .insert("low".to_string(), header_rule(1, "v2", Some("low-target")));
        config
            .rules
            .insert("high".to_string(), header_rule(99, "v2", Some("high-target")));
        let router = GrayRouter::from_config(&config).unwrap();

        let mut c = ctx();
        c.headers
            .insert("x-gray-version", HeaderValue::from_static("v2"));
        assert_eq!(
            router.route(&c),
            RouteTarget::Gray {
                version: Some("high-target".to_string())
            }
        );
    }

    #[test]
    fn test_unmatched_rule_falls_through_to_weight() {
        let mut config = config_with_weight(0);
        config
            .rules
            .insert("beta".to_string(), header_rule(10, "v2", None));
        let router = GrayRouter::from_config(&config).unwrap();

        // No matching header: weight 0 sends everything stable
        assert_eq!(router.route(&ctx()), RouteTarget::Stable);
    }

    #[test]
    fn test_reload_changes_weight_without_restart() {
        let router = GrayRouter::from_config(&config_with_weight(0)).unwrap();
        assert_eq!(router.route(&ctx()), RouteTarget::Stable);

        let settings = GraySettings::from_config(&config_with_weight(100)).unwrap();
        router.reload(settings);

        assert_eq!(router.weight(), 100);
        assert_eq!(router.route(&ctx()), RouteTarget::Gray { version: None });
    }

    #[test]
    fn test_invalid_rule_fails_compilation() {
        let mut config = config_with_weight(10);
        config
            .rules
            .insert("broken".to_string(), GrayRuleConfig::default());
        assert!(GrayRouter::from_config(&config).is_err());
    }
}
