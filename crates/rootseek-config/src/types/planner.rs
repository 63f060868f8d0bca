//! Query planner behaviour

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlannerConfig {
    /// How strategies are scheduled
    #[serde(default)]
    pub mode: PlannerMode,

    /// Produce a traversal explanation for the seed candidate
    #[serde(default = "default_explain")]
    pub explain: bool,

    /// Derive a literal pattern from identifier-like tokens when none is given
    #[serde(default = "default_derive_literal_hints")]
    pub derive_literal_hints: bool,

    /// Maximum candidates returned in an answer
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
}

/// Strategy scheduling mode
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PlannerMode {
    /// semantic → graph → lexical, escalating only on low confidence
    #[default]
    Sequential,
    /// semantic and lexical concurrently, graph only if neither is confident
    Speculative,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            mode: PlannerMode::default(),
            explain: default_explain(),
            derive_literal_hints: default_derive_literal_hints(),
            max_candidates: default_max_candidates(),
        }
    }
}

impl crate::validation::Validate for PlannerConfig {
    fn validate(&self) -> crate::error::Result<()> {
        use crate::validation::{validate_at_most, validate_positive};

        validate_positive("planner.max_candidates", self.max_candidates, 0)?;
        validate_at_most("planner.max_candidates", self.max_candidates, 1000)?;
        Ok(())
    }
}

fn default_explain() -> bool {
    true
}

fn default_derive_literal_hints() -> bool {
    true
}

fn default_max_candidates() -> usize {
    20
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::Validate;

    #[test]
    fn test_default_is_valid() {
        let config = PlannerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.mode, PlannerMode::Sequential);
    }

    #[test]
    fn test_mode_serialization() {
        assert_eq!(
            serde_json::to_string(&PlannerMode::Speculative).unwrap(),
            "\"speculative\""
        );
    }

    #[test]
    fn test_zero_candidates_invalid() {
        let config = PlannerConfig {
            max_candidates: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
