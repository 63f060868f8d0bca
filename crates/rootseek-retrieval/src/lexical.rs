use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use rootseek_config::RetrievalConfig;
use rootseek_core::timeout::bounded;
use rootseek_core::{
    normalize_node_id, LexicalBackend, LexicalMatch, NodeId, RetrievalError, RetrievalHit,
    RetrievalOutcome, RetrievalRequest, Retriever, Strategy,
};

/// Score shared by every hit of one lexical call with `total` matches.
///
/// Many matches mean a common token, so the score shrinks as the total grows.
pub fn lexical_score(total: usize) -> f32 {
    (1.0 / (1.0 + (1.0 + total as f64).ln())) as f32
}

/// Literal keyword search through an external tool.
pub struct LexicalRetriever {
    backend: Arc<dyn LexicalBackend>,
    timeout: Duration,
    max_matches: usize,
}

impl LexicalRetriever {
    pub fn new(backend: Arc<dyn LexicalBackend>, config: &RetrievalConfig) -> Self {
        Self {
            backend,
            timeout: Duration::from_millis(config.timeout_ms),
            max_matches: config.lexical_max_matches,
        }
    }

    pub async fn search(&self, pattern: &str, scope: Option<&str>) -> RetrievalOutcome {
        match self.find(pattern, scope).await {
            Ok(matches) => RetrievalOutcome::ok(Strategy::Lexical, self.to_hits(matches)),
            Err(condition) => RetrievalOutcome::unavailable(Strategy::Lexical, condition),
        }
    }

    /// Search only inside `files` that also lie under `scope`; the score
    /// counts the matches that remain.
    pub async fn search_scoped(
        &self,
        pattern: &str,
        scope: Option<&str>,
        files: &[NodeId],
    ) -> RetrievalOutcome {
        let allowed: HashSet<NodeId> = files.iter().map(|f| normalize_node_id(f)).collect();
        match self.find(pattern, scope).await {
            Ok(matches) => {
                let kept: Vec<LexicalMatch> = matches
                    .into_iter()
                    .filter(|m| allowed.contains(&normalize_node_id(&m.path)))
                    .collect();
                RetrievalOutcome::ok(Strategy::Lexical, self.to_hits(kept))
            }
            Err(condition) => RetrievalOutcome::unavailable(Strategy::Lexical, condition),
        }
    }

    async fn find(
        &self,
        pattern: &str,
        scope: Option<&str>,
    ) -> Result<Vec<LexicalMatch>, RetrievalError> {
        bounded(self.timeout, "literal search", self.backend.find(pattern, scope))
            .await
            .map_err(|e| {
                warn!(pattern, error = %format!("{e:#}"), "lexical backend failed");
                RetrievalError::retriever(Strategy::Lexical, &e)
            })
    }

    /// One hit per match, ordered by path then line. `raw_score` is the
    /// match count of the hit's file.
    fn to_hits(&self, matches: Vec<LexicalMatch>) -> Vec<RetrievalHit> {
        let total = matches.len();
        let score = lexical_score(total);

        let mut by_file: BTreeMap<NodeId, Vec<LexicalMatch>> = BTreeMap::new();
        for m in matches {
            by_file.entry(normalize_node_id(&m.path)).or_default().push(m);
        }

        let mut hits = Vec::with_capacity(total.min(self.max_matches));
        for (file, mut file_matches) in by_file {
            file_matches.sort_by_key(|m| m.line);
            let count = file_matches.len() as f32;
            for m in file_matches {
                hits.push(
                    RetrievalHit::new(&file, Strategy::Lexical, count, score)
                        .with_line(m.line)
                        .with_snippet(m.text.trim()),
                );
            }
        }
        if hits.len() > self.max_matches {
            debug!(total, kept = self.max_matches, "lexical matches capped");
            hits.truncate(self.max_matches);
        }
        hits
    }
}

#[async_trait]
impl Retriever for LexicalRetriever {
    fn strategy(&self) -> Strategy {
        Strategy::Lexical
    }

    async fn retrieve(&self, request: &RetrievalRequest) -> RetrievalOutcome {
        let Some(pattern) = request.pattern.as_deref().map(str::trim).filter(|p| !p.is_empty())
        else {
            return RetrievalOutcome::ok(Strategy::Lexical, Vec::new());
        };
        if request.seeds.is_empty() {
            self.search(pattern, request.scope.as_deref()).await
        } else {
            let files: Vec<NodeId> = request.seeds.iter().map(|s| s.node_id.clone()).collect();
            self.search_scoped(pattern, request.scope.as_deref(), &files).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rootseek_core::Seed;
    use std::sync::Mutex;

    struct Matches(Vec<LexicalMatch>);

    /// Filters by scope prefix and remembers every scope it was asked for.
    struct ScopeAware {
        matches: Vec<LexicalMatch>,
        scopes: Mutex<Vec<Option<String>>>,
    }

    #[async_trait]
    impl LexicalBackend for ScopeAware {
        async fn find(&self, _pattern: &str, scope: Option<&str>) -> anyhow::Result<Vec<LexicalMatch>> {
            self.scopes.lock().unwrap().push(scope.map(str::to_string));
            Ok(self
                .matches
                .iter()
                .filter(|m| scope.map_or(true, |s| m.path.starts_with(s)))
                .cloned()
                .collect())
        }
    }

    #[async_trait]
    impl LexicalBackend for Matches {
        async fn find(&self, _pattern: &str, _scope: Option<&str>) -> anyhow::Result<Vec<LexicalMatch>> {
            Ok(self.0.clone())
        }
    }

    fn spread(total: usize, files: usize) -> Vec<LexicalMatch> {
        (0..total)
            .map(|i| LexicalMatch {
                path: format!("src/File{}.kt", i % files),
                line: i + 1,
                text: "val author_name = comment.author".to_string(),
            })
            .collect()
    }

    fn retriever(matches: Vec<LexicalMatch>) -> LexicalRetriever {
        LexicalRetriever::new(Arc::new(Matches(matches)), &RetrievalConfig::default())
    }

    #[tokio::test]
    async fn every_hit_shares_the_total_based_score() {
        let outcome = retriever(spread(80, 15)).search("author_name", None).await;
        assert!(outcome.is_available());
        assert_eq!(outcome.hits.len(), 80);
        let expected = (1.0 / (1.0 + 81f64.ln())) as f32;
        assert!(outcome.hits.iter().all(|h| (h.normalized_score - expected).abs() < 1e-6));
        let files: HashSet<_> = outcome.hits.iter().map(|h| h.node_id.clone()).collect();
        assert_eq!(files.len(), 15);
    }

    #[tokio::test]
    async fn raw_score_counts_matches_per_file() {
        let outcome = retriever(spread(7, 3)).search("author_name", None).await;
        let file0: Vec<_> = outcome.hits.iter().filter(|h| h.node_id == "src/File0.kt").collect();
        assert_eq!(file0.len(), 3);
        assert!(file0.iter().all(|h| h.raw_score == 3.0));
        assert_eq!(file0[0].line, Some(1));
    }

    #[tokio::test]
    async fn cap_applies_after_scoring() {
        let mut config = RetrievalConfig::default();
        config.lexical_max_matches = 10;
        let lexical = LexicalRetriever::new(Arc::new(Matches(spread(80, 15))), &config);
        let outcome = lexical.search("author_name", None).await;
        assert_eq!(outcome.hits.len(), 10);
        assert!((outcome.hits[0].normalized_score - lexical_score(80)).abs() < 1e-6);
    }

    #[tokio::test]
    async fn scoped_search_keeps_only_candidate_files() {
        let outcome = retriever(spread(80, 15))
            .search_scoped("author_name", None, &["./src/File3.kt".to_string()])
            .await;
        assert!(outcome.hits.iter().all(|h| h.node_id == "src/File3.kt"));
        let kept = outcome.hits.len();
        assert!(kept > 0);
        assert!((outcome.hits[0].normalized_score - lexical_score(kept)).abs() < 1e-6);
    }

    #[tokio::test]
    async fn seeded_search_still_honours_the_scope() {
        let backend = Arc::new(ScopeAware {
            matches: vec![
                LexicalMatch {
                    path: "Repo/CommentRepository.kt".to_string(),
                    line: 12,
                    text: "author_name".to_string(),
                },
                LexicalMatch {
                    path: "API/CommentAPI.kt".to_string(),
                    line: 3,
                    text: "author_name".to_string(),
                },
            ],
            scopes: Mutex::new(Vec::new()),
        });
        let lexical = LexicalRetriever::new(backend.clone(), &RetrievalConfig::default());
        let request = RetrievalRequest {
            pattern: Some("author_name".to_string()),
            scope: Some("API".to_string()),
            seeds: vec![Seed {
                node_id: "Repo/CommentRepository.kt".to_string(),
                score: 0.9,
            }],
            ..Default::default()
        };

        let outcome = lexical.retrieve(&request).await;
        assert!(outcome.is_available());
        assert!(outcome.hits.is_empty());
        assert_eq!(*backend.scopes.lock().unwrap(), vec![Some("API".to_string())]);
    }

    #[test]
    fn score_is_one_for_no_matches_and_shrinks() {
        assert!((lexical_score(0) - 1.0).abs() < 1e-6);
        assert!(lexical_score(10) > lexical_score(100));
    }
}
