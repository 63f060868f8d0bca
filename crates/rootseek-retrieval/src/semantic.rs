use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use rootseek_config::RetrievalConfig;
use rootseek_core::timeout::bounded;
use rootseek_core::{
    RetrievalError, RetrievalHit, RetrievalOutcome, RetrievalRequest, Retriever, SemanticBackend,
    SemanticMatch, Strategy,
};

/// Embedding search through an external vector index.
pub struct SemanticRetriever {
    backend: Arc<dyn SemanticBackend>,
    timeout: Duration,
}

impl SemanticRetriever {
    pub fn new(backend: Arc<dyn SemanticBackend>, config: &RetrievalConfig) -> Self {
        Self {
            backend,
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }

    /// Closest files first, at most `top_k` of them.
    pub async fn search(&self, text: &str, top_k: usize) -> RetrievalOutcome {
        let result = bounded(self.timeout, "embedding search", self.backend.embed_search(text, top_k)).await;
        let mut matches = match result {
            Ok(matches) => matches,
            Err(e) => {
                warn!(error = %format!("{e:#}"), "semantic backend failed");
                return RetrievalOutcome::unavailable(
                    Strategy::Semantic,
                    RetrievalError::retriever(Strategy::Semantic, &e),
                );
            }
        };

        if !is_ascending(&matches) {
            warn!(count = matches.len(), "semantic results out of order, re-sorting");
            matches.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        }
        matches.truncate(top_k);

        let hits = matches
            .into_iter()
            .map(|m| RetrievalHit::new(&m.path, Strategy::Semantic, m.distance, 1.0 - m.distance))
            .collect();
        RetrievalOutcome::ok(Strategy::Semantic, hits)
    }
}

fn is_ascending(matches: &[SemanticMatch]) -> bool {
    matches
        .windows(2)
        .all(|w| w[0].distance.total_cmp(&w[1].distance) != Ordering::Greater)
}

#[async_trait]
impl Retriever for SemanticRetriever {
    fn strategy(&self) -> Strategy {
        Strategy::Semantic
    }

    async fn retrieve(&self, request: &RetrievalRequest) -> RetrievalOutcome {
        match request.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            Some(text) => self.search(text, request.top_k).await,
            None => RetrievalOutcome::ok(Strategy::Semantic, Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<(&'static str, f32)>);

    #[async_trait]
    impl SemanticBackend for Fixed {
        async fn embed_search(&self, _text: &str, _top_k: usize) -> anyhow::Result<Vec<SemanticMatch>> {
            Ok(self
                .0
                .iter()
                .map(|(path, distance)| SemanticMatch {
                    path: path.to_string(),
                    distance: *distance,
                })
                .collect())
        }
    }

    struct Broken;

    #[async_trait]
    impl SemanticBackend for Broken {
        async fn embed_search(&self, _text: &str, _top_k: usize) -> anyhow::Result<Vec<SemanticMatch>> {
            anyhow::bail!("collection code_files not found")
        }
    }

    fn retriever(backend: impl SemanticBackend + 'static) -> SemanticRetriever {
        SemanticRetriever::new(Arc::new(backend), &RetrievalConfig::default())
    }

    #[tokio::test]
    async fn scores_are_one_minus_distance_clamped() {
        let outcome = retriever(Fixed(vec![("a", 0.1), ("b", 0.4), ("c", 1.3)]))
            .search("comment author", 10)
            .await;
        let scores: Vec<f32> = outcome.hits.iter().map(|h| h.normalized_score).collect();
        assert!((scores[0] - 0.9).abs() < 1e-6);
        assert!((scores[1] - 0.6).abs() < 1e-6);
        assert_eq!(scores[2], 0.0);
    }

    #[tokio::test]
    async fn unsorted_results_are_stably_resorted_and_truncated() {
        let outcome = retriever(Fixed(vec![("c", 0.5), ("a", 0.2), ("b", 0.2), ("d", 0.9)]))
            .search("comment author", 3)
            .await;
        let ids: Vec<_> = outcome.hits.iter().map(|h| h.node_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn backend_failure_is_reported_not_raised() {
        let outcome = retriever(Broken).search("comment author", 5).await;
        assert!(outcome.hits.is_empty());
        assert!(matches!(
            outcome.condition,
            Some(RetrievalError::RetrieverUnavailable {
                strategy: Strategy::Semantic,
                ..
            })
        ));
    }
}
