use thiserror::Error;

use crate::models::Strategy;

/// Conditions raised while answering a query.
///
/// Only `InvalidQuery` and `Cancelled` ever reach the caller as errors; the
/// backend conditions are recorded in the answer trace instead.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RetrievalError {
    #[error("{strategy} retriever unavailable: {reason}")]
    RetrieverUnavailable { strategy: Strategy, reason: String },

    #[error("relationship index unavailable: {reason}")]
    IndexUnavailable { reason: String },

    #[error("invalid query: {reason}")]
    InvalidQuery { reason: String },

    #[error("query cancelled")]
    Cancelled,
}

impl RetrievalError {
    pub fn retriever(strategy: Strategy, err: &anyhow::Error) -> Self {
        Self::RetrieverUnavailable {
            strategy,
            reason: format!("{err:#}"),
        }
    }

    pub fn index(err: &anyhow::Error) -> Self {
        Self::IndexUnavailable {
            reason: format!("{err:#}"),
        }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidQuery {
            reason: reason.into(),
        }
    }
}
