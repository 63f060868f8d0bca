//! Backend call settings shared by all retrievers

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalConfig {
    /// Per-call timeout for every backend request, in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Number of semantic hits requested when the query does not override it
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Lexical matches kept per call (the score still counts every match)
    #[serde(default = "default_lexical_max_matches")]
    pub lexical_max_matches: usize,

    /// Glob patterns the filesystem literal backend searches (empty = everything)
    #[serde(default)]
    pub include_paths: Vec<String>,

    /// Glob patterns the filesystem literal backend skips
    #[serde(default = "default_exclude_paths")]
    pub exclude_paths: Vec<String>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            top_k: default_top_k(),
            lexical_max_matches: default_lexical_max_matches(),
            include_paths: Vec::new(),
            exclude_paths: default_exclude_paths(),
        }
    }
}

impl crate::validation::Validate for RetrievalConfig {
    fn validate(&self) -> crate::error::Result<()> {
        use crate::validation::{validate_at_most, validate_positive};

        validate_positive("retrieval.timeout_ms", self.timeout_ms as usize, 0)?;
        validate_positive("retrieval.top_k", self.top_k, 0)?;
        validate_at_most("retrieval.top_k", self.top_k, 1000)?;
        validate_positive("retrieval.lexical_max_matches", self.lexical_max_matches, 0)?;
        Ok(())
    }
}

fn default_timeout_ms() -> u64 {
    5_000
}

fn default_top_k() -> usize {
    10
}

fn default_lexical_max_matches() -> usize {
    500
}

fn default_exclude_paths() -> Vec<String> {
    ["node_modules/**", "dist/**", "build/**", "target/**", ".git/**"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}
