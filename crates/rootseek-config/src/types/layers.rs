//! Architectural layer rules

use serde::{Deserialize, Serialize};

/// One path-matching rule of the layer classifier
///
/// `pattern` is a case-insensitive substring unless it contains a glob
/// metacharacter (`*`, `?`, `[`), in which case it is matched as a glob
/// against the whole normalized path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LayerRule {
    pub pattern: String,

    /// Layer tag this rule stands for ("repository", "use_case", "service", "api")
    #[serde(default)]
    pub layer: Option<String>,

    pub priority: u32,
}

impl LayerRule {
    pub fn new(pattern: &str, layer: &str, priority: u32) -> Self {
        Self {
            pattern: pattern.to_string(),
            layer: Some(layer.to_string()),
            priority,
        }
    }
}

/// Ordered layer rules; the first matching rule wins
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LayerConfig {
    #[serde(default = "default_rules")]
    pub rules: Vec<LayerRule>,

    /// Priority for paths no rule matches
    #[serde(default = "default_fallback_priority")]
    pub fallback_priority: u32,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            rules: default_rules(),
            fallback_priority: default_fallback_priority(),
        }
    }
}

impl crate::validation::Validate for LayerConfig {
    fn validate(&self) -> crate::error::Result<()> {
        use crate::error::ConfigError;

        for (idx, rule) in self.rules.iter().enumerate() {
            if rule.pattern.trim().is_empty() {
                return Err(ConfigError::ValidationError {
                    field: format!("layers.rules[{}].pattern", idx),
                    message: "pattern must not be empty".to_string(),
                });
            }
            // Unmatched paths must rank lowest.
            if rule.priority < self.fallback_priority {
                return Err(ConfigError::ValidationError {
                    field: format!("layers.rules[{}].priority", idx),
                    message: format!(
                        "priority {} is below fallback_priority {}",
                        rule.priority, self.fallback_priority
                    ),
                });
            }
        }
        Ok(())
    }
}

fn default_rules() -> Vec<LayerRule> {
    vec![
        LayerRule::new("repository", "repository", 5),
        LayerRule::new("usecase", "use_case", 4),
        LayerRule::new("service", "service", 3),
        LayerRule::new("api", "api", 2),
    ]
}

fn default_fallback_priority() -> u32 {
    1
}
