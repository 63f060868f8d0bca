//! Graph traversal configuration

use serde::{Deserialize, Serialize};

/// Relationship index traversal settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphConfig {
    /// Maximum hops for neighbor traversal and path explanation
    ///
    /// Recommended: 2-4
    #[serde(default = "default_max_hops")]
    pub max_hops: usize,

    /// Upper bound on enumerated paths per traversal call
    #[serde(default = "default_max_paths")]
    pub max_paths: usize,

    /// Relation types followed by the graph strategy (empty = all)
    ///
    /// Values: "SIMILAR_TO", "CALLS", "IMPORTS", "BELONGS_TO" or any custom relation.
    #[serde(default = "default_relations")]
    pub relations: Vec<String>,

    /// Minimum similarity score for building SIMILAR_TO edges
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,

    /// Number of top candidates used as seeds for graph expansion
    #[serde(default = "default_expansion_seeds")]
    pub expansion_seeds: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            max_hops: default_max_hops(),
            max_paths: default_max_paths(),
            relations: default_relations(),
            similarity_threshold: default_similarity_threshold(),
            expansion_seeds: default_expansion_seeds(),
        }
    }
}

impl crate::validation::Validate for GraphConfig {
    fn validate(&self) -> crate::error::Result<()> {
        use crate::validation::{validate_at_most, validate_positive, validate_range};

        validate_positive("graph.max_hops", self.max_hops, 0)?;
        validate_at_most("graph.max_hops", self.max_hops, 10)?;
        validate_positive("graph.max_paths", self.max_paths, 0)?;
        validate_positive("graph.expansion_seeds", self.expansion_seeds, 0)?;
        validate_range("graph.similarity_threshold", self.similarity_threshold, 0.0, 1.0)?;
        Ok(())
    }
}

fn default_max_hops() -> usize {
    3
}

fn default_max_paths() -> usize {
    256
}

fn default_relations() -> Vec<String> {
    Vec::new()
}

fn default_similarity_threshold() -> f32 {
    0.75
}

fn default_expansion_seeds() -> usize {
    5
}
