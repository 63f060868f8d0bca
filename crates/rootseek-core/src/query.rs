use serde::{Deserialize, Serialize};

use crate::error::RetrievalError;

pub const MAX_HOPS_LIMIT: usize = 10;
pub const MAX_TOP_K: usize = 1000;

/// A caller's request: natural-language text, a literal pattern, or both.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Query {
    pub text: Option<String>,
    pub pattern: Option<String>,
    /// Path prefix restricting lexical search and layer ranking.
    pub scope: Option<String>,
    pub max_hops: Option<usize>,
    pub top_k: Option<usize>,
    /// Explanation target: a layer name or a file-name fragment.
    pub target: Option<String>,
}

impl Query {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn pattern(pattern: impl Into<String>) -> Self {
        Self {
            pattern: Some(pattern.into()),
            ..Default::default()
        }
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn with_max_hops(mut self, max_hops: usize) -> Self {
        self.max_hops = Some(max_hops);
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Trimmed text, if any is left.
    pub fn natural_text(&self) -> Option<&str> {
        non_blank(self.text.as_deref())
    }

    pub fn literal_pattern(&self) -> Option<&str> {
        non_blank(self.pattern.as_deref())
    }

    pub fn scope_prefix(&self) -> Option<&str> {
        non_blank(self.scope.as_deref())
    }

    /// Reject malformed queries before any backend is touched.
    pub fn validate(&self) -> Result<(), RetrievalError> {
        if self.natural_text().is_none() && self.literal_pattern().is_none() {
            return Err(RetrievalError::invalid(
                "query needs non-blank text or pattern",
            ));
        }
        if let Some(hops) = self.max_hops {
            if hops == 0 || hops > MAX_HOPS_LIMIT {
                return Err(RetrievalError::invalid(format!(
                    "max_hops must be between 1 and {MAX_HOPS_LIMIT}, got {hops}"
                )));
            }
        }
        if let Some(k) = self.top_k {
            if k == 0 || k > MAX_TOP_K {
                return Err(RetrievalError::invalid(format!(
                    "top_k must be between 1 and {MAX_TOP_K}, got {k}"
                )));
            }
        }
        Ok(())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}
