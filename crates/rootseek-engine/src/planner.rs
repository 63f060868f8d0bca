use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use rootseek_config::{Config, PlannerConfig, PlannerMode, Validate};
use rootseek_core::{
    GraphBackend, LayerClassifier, LexicalBackend, Query, RankedCandidate, RetrievalError,
    RetrievalOutcome, RetrievalRequest, Retriever, Seed, SemanticBackend, Strategy,
    TraversalPath,
};
use rootseek_graph::{GraphRetriever, RelationIndex};
use rootseek_retrieval::{LexicalRetriever, SemanticRetriever};

use crate::explainer::{PathExplainer, TargetFilter};
use crate::ranker::{HybridRanker, Ranking};
use crate::session::{Answer, AttemptStatus, ExplainRecord, PlannerState, QuerySession};

/// External collaborators the planner talks to.
#[derive(Clone)]
pub struct Backends {
    pub lexical: Arc<dyn LexicalBackend>,
    pub semantic: Arc<dyn SemanticBackend>,
    pub graph: Arc<dyn GraphBackend>,
}

/// Escalating strategy scheduler.
///
/// Runs semantic search first, then graph expansion, then lexical search,
/// stopping as soon as the ranker is confident. Backends are shared; each
/// call to [`answer`](Self::answer) owns its own session.
pub struct QueryPlanner {
    semantic: SemanticRetriever,
    graph: GraphRetriever,
    lexical: LexicalRetriever,
    ranker: HybridRanker,
    explainer: PathExplainer,
    index: Arc<RelationIndex>,
    options: PlannerConfig,
    top_k: usize,
    max_hops: usize,
}

impl QueryPlanner {
    /// Build a planner over `backends`.
    ///
    /// `config` is validated first, so a hand-built one with a zero path
    /// budget or timeout is rejected here.
    pub fn new(config: &Config, backends: Backends) -> rootseek_config::Result<Self> {
        config.validate()?;
        let classifier = Arc::new(LayerClassifier::new(&config.layers));
        let timeout = Duration::from_millis(config.retrieval.timeout_ms);
        let index = Arc::new(RelationIndex::new(
            backends.graph,
            classifier.clone(),
            &config.graph,
            timeout,
        ));
        Ok(Self {
            semantic: SemanticRetriever::new(backends.semantic, &config.retrieval),
            graph: GraphRetriever::new(index.clone(), &config.graph),
            lexical: LexicalRetriever::new(backends.lexical, &config.retrieval),
            ranker: HybridRanker::new(&config.ranking, classifier),
            explainer: PathExplainer::new(index.clone()),
            index,
            options: config.planner.clone(),
            top_k: config.retrieval.top_k,
            max_hops: config.graph.max_hops,
        })
    }

    pub fn relation_index(&self) -> &Arc<RelationIndex> {
        &self.index
    }

    /// Answer `query`.
    ///
    /// Backend failures never fail the call; they show up as unavailable
    /// attempts in the trace. Only a malformed query is rejected.
    #[instrument(skip(self, query), fields(text = ?query.text, pattern = ?query.pattern))]
    pub async fn answer(&self, query: Query) -> Result<Answer, RetrievalError> {
        query.validate()?;
        let mut session = QuerySession::new(query);

        let ranking = match self.options.mode {
            PlannerMode::Sequential => self.run_sequential(&mut session).await,
            PlannerMode::Speculative => self.run_speculative(&mut session).await,
        };

        let mut candidates = ranking.candidates;
        candidates.truncate(self.options.max_candidates);
        let explanation = self.explain(&mut session, &candidates).await;

        let answer = session.finish(candidates, &ranking.confidence, explanation);
        info!(
            status = ?answer.status,
            candidates = answer.candidates.len(),
            top = answer.top().map(|c| c.node_id.as_str()),
            "query answered"
        );
        Ok(answer)
    }

    /// Like [`answer`](Self::answer) but gives up with
    /// [`RetrievalError::Cancelled`] once `token` fires. In-flight backend
    /// calls are dropped and partial results discarded.
    #[instrument(skip(self, query, token))]
    pub async fn answer_with_cancel(
        &self,
        query: Query,
        token: CancellationToken,
    ) -> Result<Answer, RetrievalError> {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                info!("query cancelled");
                Err(RetrievalError::Cancelled)
            }
            answer = self.answer(query) => answer,
        }
    }

    async fn run_sequential(&self, session: &mut QuerySession) -> Ranking {
        let mut ranking = self.ranker.rank(&[]);

        session.enter(PlannerState::Semantic);
        match self.semantic_request(&session.query) {
            Some(request) => {
                let outcome = self.semantic.retrieve(&request).await;
                ranking = self.absorb(session, outcome);
            }
            None => session.skip(Strategy::Semantic, "no natural-language text"),
        }
        if ranking.confidence.is_confident() {
            return ranking;
        }

        session.enter(PlannerState::Graph);
        ranking = self.run_graph(session, ranking).await;
        if ranking.confidence.is_confident() {
            return ranking;
        }

        session.enter(PlannerState::Lexical);
        let request = self
            .lexical_request(&session.query, &ranking.candidates)
            .or_else(|| self.fallback_lexical_request(session, &ranking.candidates));
        match request {
            Some(request) => {
                let outcome = self.lexical.retrieve(&request).await;
                ranking = self.absorb(session, outcome);
            }
            None => session.skip(Strategy::Lexical, "no pattern hint"),
        }
        ranking
    }

    async fn run_speculative(&self, session: &mut QuerySession) -> Ranking {
        let semantic_request = self.semantic_request(&session.query);
        let lexical_request = self.lexical_request(&session.query, &[]);

        let semantic = async {
            match &semantic_request {
                Some(request) => Some(self.semantic.retrieve(request).await),
                None => None,
            }
        };
        let lexical = async {
            match &lexical_request {
                Some(request) => Some(self.lexical.retrieve(request).await),
                None => None,
            }
        };
        let (semantic, lexical) = tokio::join!(semantic, lexical);

        let mut ranking = self.ranker.rank(&[]);
        session.enter(PlannerState::Semantic);
        match semantic {
            Some(outcome) => ranking = self.absorb(session, outcome),
            None => session.skip(Strategy::Semantic, "no natural-language text"),
        }
        session.enter(PlannerState::Lexical);
        let lexical = match lexical {
            Some(outcome) => Some(outcome),
            None => match self.fallback_lexical_request(session, &[]) {
                Some(request) => Some(self.lexical.retrieve(&request).await),
                None => None,
            },
        };
        match lexical {
            Some(outcome) => ranking = self.absorb(session, outcome),
            None => session.skip(Strategy::Lexical, "no pattern hint"),
        }
        if ranking.confidence.is_confident() {
            return ranking;
        }

        session.enter(PlannerState::Graph);
        self.run_graph(session, ranking).await
    }

    async fn run_graph(&self, session: &mut QuerySession, ranking: Ranking) -> Ranking {
        let query = &session.query;
        let seeds = seeds_from(&ranking.candidates);
        if seeds.is_empty() && query.scope_prefix().is_none() && query.literal_pattern().is_none() {
            // Nothing to expand, but after an outage the trace must still
            // say whether the index is reachable.
            if session.degraded() {
                if let Err(condition) = self.index.check().await {
                    let outcome = RetrievalOutcome::unavailable(Strategy::Graph, condition);
                    return self.absorb(session, outcome);
                }
            }
            session.skip(Strategy::Graph, "no seeds, scope or pattern");
            return ranking;
        }
        let request = RetrievalRequest {
            text: query.natural_text().map(str::to_string),
            pattern: query.literal_pattern().map(str::to_string),
            scope: query.scope_prefix().map(str::to_string),
            seeds,
            top_k: self.top_k_for(query),
            max_hops: self.max_hops_for(query),
        };
        let outcome = self.graph.retrieve(&request).await;
        self.absorb(session, outcome)
    }

    fn absorb(&self, session: &mut QuerySession, outcome: RetrievalOutcome) -> Ranking {
        let strategy = outcome.strategy;
        let available = outcome.is_available();
        let hits = outcome.hits.len();
        session.record(outcome);
        let ranking = self.ranker.rank(session.hits());
        session.set_confidence(strategy, &ranking.confidence);
        info!(
            %strategy,
            available,
            hits,
            confident = ranking.confidence.is_confident(),
            "strategy finished"
        );
        ranking
    }

    async fn explain(
        &self,
        session: &mut QuerySession,
        candidates: &[RankedCandidate],
    ) -> Option<TraversalPath> {
        if !self.options.explain {
            return None;
        }
        let seed = candidates.first()?.node_id.clone();
        session.enter(PlannerState::Explain);

        if session.strategy_status(Strategy::Graph) == Some(AttemptStatus::Unavailable) {
            session.record_explain(ExplainRecord {
                seed,
                status: AttemptStatus::Skipped,
                reason: Some("relationship index unavailable".to_string()),
            });
            return None;
        }

        let target = session.query.target.as_deref().and_then(TargetFilter::parse);
        let max_hops = self.max_hops_for(&session.query);
        match self.explainer.explain(&seed, target.as_ref(), max_hops).await {
            Ok(path) => {
                debug!(seed = %seed, found = path.is_some(), "explanation");
                session.record_explain(ExplainRecord {
                    seed,
                    status: AttemptStatus::Completed,
                    reason: path.is_none().then(|| "no qualifying path".to_string()),
                });
                path
            }
            Err(condition) => {
                session.record_explain(ExplainRecord {
                    seed,
                    status: AttemptStatus::Unavailable,
                    reason: Some(condition.to_string()),
                });
                None
            }
        }
    }

    fn semantic_request(&self, query: &Query) -> Option<RetrievalRequest> {
        let text = query.natural_text()?;
        Some(RetrievalRequest {
            text: Some(text.to_string()),
            top_k: self.top_k_for(query),
            max_hops: self.max_hops_for(query),
            ..Default::default()
        })
    }

    /// Lexical search restricted to `candidates` when there are any.
    fn lexical_request(
        &self,
        query: &Query,
        candidates: &[RankedCandidate],
    ) -> Option<RetrievalRequest> {
        let pattern = match query.literal_pattern() {
            Some(pattern) => pattern.to_string(),
            None if self.options.derive_literal_hints => {
                literal_hint(query.natural_text()?)?.to_string()
            }
            None => return None,
        };
        Some(RetrievalRequest {
            pattern: Some(pattern),
            scope: query.scope_prefix().map(str::to_string),
            seeds: seeds_from(candidates),
            top_k: self.top_k_for(query),
            max_hops: self.max_hops_for(query),
            ..Default::default()
        })
    }

    /// Keyword search on the most distinctive word of the text, used only
    /// once another strategy has lost its backend.
    fn fallback_lexical_request(
        &self,
        session: &QuerySession,
        candidates: &[RankedCandidate],
    ) -> Option<RetrievalRequest> {
        if !session.degraded() {
            return None;
        }
        let query = &session.query;
        let keyword = fallback_keyword(query.natural_text()?)?;
        debug!(keyword, "lexical keyword fallback");
        Some(RetrievalRequest {
            pattern: Some(keyword.to_string()),
            scope: query.scope_prefix().map(str::to_string),
            seeds: seeds_from(candidates),
            top_k: self.top_k_for(query),
            max_hops: self.max_hops_for(query),
            ..Default::default()
        })
    }

    fn top_k_for(&self, query: &Query) -> usize {
        query.top_k.unwrap_or(self.top_k)
    }

    fn max_hops_for(&self, query: &Query) -> usize {
        query.max_hops.unwrap_or(self.max_hops)
    }
}

/// Candidates as seeds, scored by their best normalized hit.
fn seeds_from(candidates: &[RankedCandidate]) -> Vec<Seed> {
    candidates
        .iter()
        .map(|c| Seed {
            node_id: c.node_id.clone(),
            score: c
                .contributing_hits
                .iter()
                .map(|h| h.normalized_score)
                .fold(0.0_f32, f32::max),
        })
        .collect()
}

/// First identifier-looking token of `text`: snake_case, dotted or `::`
/// paths, or camelCase.
pub fn literal_hint(text: &str) -> Option<&str> {
    text.split_whitespace()
        .map(|token| token.trim_matches(|c: char| !c.is_alphanumeric() && c != '_'))
        .find(|token| is_identifier_like(token))
}

/// Longest word of at least four alphanumeric characters, first on ties.
fn fallback_keyword(text: &str) -> Option<&str> {
    text.split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|word| word.chars().count() >= 4)
        .rev()
        .max_by_key(|word| word.chars().count())
}

fn is_identifier_like(token: &str) -> bool {
    if token.len() < 3 {
        return false;
    }
    if token.contains('_') || token.contains("::") || token.contains('.') {
        return true;
    }
    let chars: Vec<char> = token.chars().collect();
    chars
        .windows(2)
        .any(|pair| pair[0].is_lowercase() && pair[1].is_uppercase())
}
