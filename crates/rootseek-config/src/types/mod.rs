//! Configuration type definitions
//!
//! Each section is self-contained with validation and defaults.

pub mod graph;
pub mod layers;
pub mod planner;
pub mod ranking;
pub mod retrieval;

pub use graph::GraphConfig;
pub use layers::{LayerConfig, LayerRule};
pub use planner::{PlannerConfig, PlannerMode};
pub use ranking::RankingConfig;
pub use retrieval::RetrievalConfig;

use serde::{Deserialize, Serialize};

/// Top-level configuration aggregating all settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Strategy weights and confidence policy
    #[serde(default)]
    pub ranking: RankingConfig,

    /// Architectural layer rules
    #[serde(default)]
    pub layers: LayerConfig,

    /// Graph traversal settings
    #[serde(default)]
    pub graph: GraphConfig,

    /// Backend call settings
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Strategy scheduling
    #[serde(default)]
    pub planner: PlannerConfig,
}

impl crate::validation::Validate for Config {
    fn validate(&self) -> crate::error::Result<()> {
        self.ranking.validate()?;
        self.layers.validate()?;
        self.graph.validate()?;
        self.retrieval.validate()?;
        self.planner.validate()?;
        Ok(())
    }
}
