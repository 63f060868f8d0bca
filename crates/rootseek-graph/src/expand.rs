use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use rootseek_config::GraphConfig;
use rootseek_core::{
    NodeId, RelationType, RetrievalError, RetrievalHit, RetrievalOutcome, RetrievalRequest,
    Retriever, Seed, Strategy,
};

use crate::index::RelationIndex;

/// The graph strategy: expands seed candidates through the relation index.
///
/// Seeds are the candidates of earlier strategies. Without any, the nodes
/// under the query scope (or its pattern) ranked by layer become the seeds
/// and are reported as hits themselves. Every node reached from a seed
/// scores the seed's score times the product of the edge weights walked.
pub struct GraphRetriever {
    index: Arc<RelationIndex>,
    relations: Option<Vec<RelationType>>,
    expansion_seeds: usize,
}

impl GraphRetriever {
    pub fn new(index: Arc<RelationIndex>, config: &GraphConfig) -> Self {
        let relations = (!config.relations.is_empty()).then(|| {
            config
                .relations
                .iter()
                .map(|r| RelationType::from(r.as_str()))
                .collect()
        });
        Self {
            index,
            relations,
            expansion_seeds: config.expansion_seeds,
        }
    }

    pub fn index(&self) -> &Arc<RelationIndex> {
        &self.index
    }

    async fn layer_seeds(&self, prefix: &str) -> Result<Vec<Seed>, RetrievalError> {
        let classifier = self.index.classifier();
        let max = classifier.max_priority().max(1) as f32;
        let nodes = self.index.rank_by_layer(prefix).await?;
        Ok(nodes
            .iter()
            .map(|node| Seed {
                node_id: node.id.clone(),
                score: classifier.priority_of(node) as f32 / max,
            })
            .collect())
    }

    async fn expand(&self, request: &RetrievalRequest) -> Result<Vec<RetrievalHit>, RetrievalError> {
        let mut best: BTreeMap<NodeId, RetrievalHit> = BTreeMap::new();

        let seeds = if request.seeds.is_empty() {
            let prefix = request
                .scope
                .as_deref()
                .or(request.pattern.as_deref())
                .map(str::trim)
                .filter(|p| !p.is_empty());
            let Some(prefix) = prefix else {
                return Ok(Vec::new());
            };
            let seeds = self.layer_seeds(prefix).await?;
            for seed in &seeds {
                offer(
                    &mut best,
                    RetrievalHit::new(&seed.node_id, Strategy::Graph, seed.score, seed.score),
                );
            }
            seeds
        } else {
            request.seeds.clone()
        };

        for seed in seeds.iter().take(self.expansion_seeds) {
            let paths = self
                .index
                .neighbors(&seed.node_id, self.relations.as_deref(), request.max_hops)
                .await?;
            for path in paths {
                let product = path.weight_product();
                let hit = RetrievalHit::new(path.target(), Strategy::Graph, product, seed.score * product)
                    .with_snippet(path.render());
                offer(&mut best, hit);
            }
        }

        let mut hits: Vec<RetrievalHit> = best.into_values().collect();
        hits.sort_by(|a, b| {
            b.normalized_score
                .total_cmp(&a.normalized_score)
                .then_with(|| a.node_id.cmp(&b.node_id))
        });
        hits.truncate(request.top_k);
        debug!(seeds = seeds.len(), hits = hits.len(), "graph expansion");
        Ok(hits)
    }
}

/// Keep the strongest hit per node.
fn offer(best: &mut BTreeMap<NodeId, RetrievalHit>, hit: RetrievalHit) {
    match best.get(&hit.node_id) {
        Some(existing) if existing.normalized_score >= hit.normalized_score => {}
        _ => {
            best.insert(hit.node_id.clone(), hit);
        }
    }
}

#[async_trait]
impl Retriever for GraphRetriever {
    fn strategy(&self) -> Strategy {
        Strategy::Graph
    }

    async fn retrieve(&self, request: &RetrievalRequest) -> RetrievalOutcome {
        match self.expand(request).await {
            Ok(hits) => RetrievalOutcome::ok(Strategy::Graph, hits),
            Err(condition) => {
                info!(%condition, "graph strategy disabled for this query");
                RetrievalOutcome::unavailable(Strategy::Graph, condition)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{CodeGraph, GraphSnapshot};
    use rootseek_core::{CodeNode, Edge, LayerClassifier};
    use std::time::Duration;

    fn retriever() -> GraphRetriever {
        let graph = CodeGraph::from_snapshot(GraphSnapshot {
            nodes: vec![
                CodeNode::new("Repo/CommentRepository"),
                CodeNode::new("Service/CommentService"),
                CodeNode::new("API/CommentAPI"),
            ],
            edges: vec![
                Edge::new("Repo/CommentRepository", "Service/CommentService", RelationType::SimilarTo, 0.9).unwrap(),
                Edge::new("Service/CommentService", "API/CommentAPI", RelationType::SimilarTo, 0.5).unwrap(),
            ],
        })
        .unwrap();
        let config = GraphConfig::default();
        let index = RelationIndex::new(
            Arc::new(graph),
            Arc::new(LayerClassifier::default()),
            &config,
            Duration::from_secs(1),
        );
        GraphRetriever::new(Arc::new(index), &config)
    }

    fn request(seeds: Vec<Seed>) -> RetrievalRequest {
        RetrievalRequest {
            seeds,
            top_k: 10,
            max_hops: 3,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn neighbours_inherit_seed_score_times_weights() {
        let outcome = retriever()
            .retrieve(&request(vec![Seed {
                node_id: "API/CommentAPI".into(),
                score: 0.8,
            }]))
            .await;
        assert!(outcome.is_available());
        let service = outcome
            .hits
            .iter()
            .find(|h| h.node_id == "Service/CommentService")
            .unwrap();
        assert!((service.normalized_score - 0.4).abs() < 1e-6);
        let repo = outcome
            .hits
            .iter()
            .find(|h| h.node_id == "Repo/CommentRepository")
            .unwrap();
        assert!((repo.normalized_score - 0.8 * 0.5 * 0.9).abs() < 1e-6);
        assert!(outcome.hits.iter().all(|h| h.node_id != "API/CommentAPI"));
    }

    #[tokio::test]
    async fn without_seeds_the_scope_is_ranked_by_layer() {
        let mut req = request(Vec::new());
        req.scope = Some("Comment".into());
        let outcome = retriever().retrieve(&req).await;
        assert_eq!(outcome.hits[0].node_id, "Repo/CommentRepository");
        assert!((outcome.hits[0].normalized_score - 1.0).abs() < 1e-6);
        assert_eq!(outcome.hits.len(), 3);
    }

    #[tokio::test]
    async fn nothing_to_seed_from_yields_no_hits() {
        let outcome = retriever().retrieve(&request(Vec::new())).await;
        assert!(outcome.is_available());
        assert!(outcome.hits.is_empty());
    }
}
