//! Hybrid ranking configuration

use serde::{Deserialize, Serialize};

/// Strategy weights and confidence policy for the hybrid ranker
///
/// A candidate's composite score is the best weighted strategy score plus a
/// small layer bonus (`layer_priority / layer_bonus_divisor`). The defaults
/// favour semantic and graph evidence because those strategies tend to reach
/// the faulty file in fewer steps than literal search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankingConfig {
    /// Weight applied to semantic (embedding) hits
    #[serde(default = "default_semantic")]
    pub semantic: f32,

    /// Weight applied to graph-traversal hits
    #[serde(default = "default_graph")]
    pub graph: f32,

    /// Weight applied to lexical (literal match) hits
    #[serde(default = "default_lexical")]
    pub lexical: f32,

    /// Divisor turning a layer priority into a tie-breaking bonus
    ///
    /// With the default of 50 a Repository file (priority 5) gains 0.1,
    /// an API file (priority 2) gains 0.04.
    #[serde(default = "default_layer_bonus_divisor")]
    pub layer_bonus_divisor: f32,

    /// Composite score the top candidate must exceed to stop escalation
    #[serde(default = "default_acceptance_threshold")]
    pub acceptance_threshold: f32,

    /// Largest tolerated lead of another strategy's favourite over the top candidate
    #[serde(default = "default_disagreement_margin")]
    pub disagreement_margin: f32,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            semantic: default_semantic(),
            graph: default_graph(),
            lexical: default_lexical(),
            layer_bonus_divisor: default_layer_bonus_divisor(),
            acceptance_threshold: default_acceptance_threshold(),
            disagreement_margin: default_disagreement_margin(),
        }
    }
}

impl crate::validation::Validate for RankingConfig {
    fn validate(&self) -> crate::error::Result<()> {
        use crate::validation::validate_range;

        validate_range("ranking.semantic", self.semantic, 0.0, 1.0)?;
        validate_range("ranking.graph", self.graph, 0.0, 1.0)?;
        validate_range("ranking.lexical", self.lexical, 0.0, 1.0)?;
        validate_range("ranking.layer_bonus_divisor", self.layer_bonus_divisor, 1.0, 10_000.0)?;
        validate_range("ranking.acceptance_threshold", self.acceptance_threshold, 0.0, 2.0)?;
        validate_range("ranking.disagreement_margin", self.disagreement_margin, 0.0, 1.0)?;
        Ok(())
    }
}

fn default_semantic() -> f32 {
    1.0
}

fn default_graph() -> f32 {
    0.9
}

fn default_lexical() -> f32 {
    0.8
}

fn default_layer_bonus_divisor() -> f32 {
    50.0
}

fn default_acceptance_threshold() -> f32 {
    0.6
}

fn default_disagreement_margin() -> f32 {
    0.25
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::Validate;

    #[test]
    fn test_default_is_valid() {
        let config = RankingConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.semantic, 1.0);
        assert_eq!(config.graph, 0.9);
        assert_eq!(config.lexical, 0.8);
    }

    #[test]
    fn test_invalid_weight_range() {
        let config = RankingConfig {
            lexical: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_divisor_rejected() {
        let config = RankingConfig {
            layer_bonus_divisor: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
