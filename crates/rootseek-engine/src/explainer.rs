use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use rootseek_core::{CodeNode, Layer, NodeId, RetrievalError, TraversalPath};
use rootseek_graph::RelationIndex;

/// Which nodes may end an explanation path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetFilter {
    pub layer: Option<Layer>,
    /// Lowercased file-name fragment.
    pub needle: String,
}

impl TargetFilter {
    /// `"API"` selects API-layer nodes as well as any file whose name
    /// contains "api".
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        let layer = match Layer::from_tag(raw) {
            Layer::Other => None,
            layer => Some(layer),
        };
        Some(Self {
            layer,
            needle: raw.to_lowercase(),
        })
    }

    pub fn for_layer(layer: Layer) -> Self {
        Self {
            layer: Some(layer),
            needle: layer.as_str().to_string(),
        }
    }

    fn matches(&self, node_id: &str, layer: Layer) -> bool {
        if self.layer.is_some_and(|wanted| wanted == layer) {
            return true;
        }
        let file_name = node_id.rsplit('/').next().unwrap_or(node_id);
        file_name.to_lowercase().contains(&self.needle)
    }
}

/// Picks the single path that best explains how a candidate relates to the
/// rest of the system.
pub struct PathExplainer {
    index: Arc<RelationIndex>,
}

impl PathExplainer {
    pub fn new(index: Arc<RelationIndex>) -> Self {
        Self { index }
    }

    /// Best path from `seed` within `max_hops`, `None` when nothing qualifies.
    pub async fn explain(
        &self,
        seed: &str,
        target: Option<&TargetFilter>,
        max_hops: usize,
    ) -> Result<Option<TraversalPath>, RetrievalError> {
        let reach = self.index.reach(seed, None, max_hops).await?;
        let nodes = &reach.nodes;

        let best = match target {
            Some(filter) => {
                let seed_priority = self.index.priority_in(nodes, seed);
                reach
                    .paths
                    .into_iter()
                    .filter(|p| p.hops() > 0)
                    .filter(|p| filter.matches(p.target(), self.layer_in(nodes, p.target())))
                    .map(|p| {
                        let downstream = p
                            .nodes
                            .iter()
                            .skip(1)
                            .all(|n| self.index.priority_in(nodes, n) < seed_priority);
                        (downstream, p)
                    })
                    .min_by(|(da, a), (db, b)| {
                        db.cmp(da)
                            .then_with(|| a.hops().cmp(&b.hops()))
                            .then_with(|| b.total_weight().total_cmp(&a.total_weight()))
                            .then_with(|| lexical(a, b))
                    })
                    .map(|(_, p)| p)
            }
            None => reach.paths.into_iter().filter(|p| p.hops() > 0).min_by(|a, b| {
                b.total_weight()
                    .total_cmp(&a.total_weight())
                    .then_with(|| a.hops().cmp(&b.hops()))
                    .then_with(|| lexical(a, b))
            }),
        };

        debug!(
            seed,
            target = target.map(|t| t.needle.as_str()),
            path = best.as_ref().map(TraversalPath::render),
            "explain"
        );
        Ok(best)
    }

    fn layer_in(&self, nodes: &HashMap<NodeId, CodeNode>, id: &str) -> Layer {
        let classifier = self.index.classifier();
        match nodes.get(id) {
            Some(node) => classifier.node_layer(node),
            None => classifier.layer_of(id),
        }
    }
}

fn lexical(a: &TraversalPath, b: &TraversalPath) -> Ordering {
    a.nodes.cmp(&b.nodes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use rootseek_config::GraphConfig;
    use rootseek_core::{Edge, LayerClassifier, RelationType};
    use rootseek_graph::{CodeGraph, GraphSnapshot};

    fn explainer(edges: Vec<Edge>) -> PathExplainer {
        let graph = CodeGraph::from_snapshot(GraphSnapshot {
            nodes: vec![
                CodeNode::new("API/CommentAPI").with_layer(Layer::Api),
                CodeNode::new("API/PostAPI").with_layer(Layer::Api),
                CodeNode::new("Service/CommentService").with_layer(Layer::Service),
                CodeNode::new("UseCase/CommentInputUseCase").with_layer(Layer::UseCase),
                CodeNode::new("Repo/CommentRepository").with_layer(Layer::Repository),
            ],
            edges,
        })
        .unwrap();
        let index = RelationIndex::new(
            Arc::new(graph),
            Arc::new(LayerClassifier::default()),
            &GraphConfig::default(),
            Duration::from_secs(1),
        );
        PathExplainer::new(Arc::new(index))
    }

    fn similar(a: &str, b: &str, weight: f32) -> Edge {
        Edge::new(a, b, RelationType::SimilarTo, weight).unwrap()
    }

    fn comment_chain() -> Vec<Edge> {
        vec![
            similar("UseCase/CommentInputUseCase", "Repo/CommentRepository", 0.9),
            similar("Repo/CommentRepository", "Service/CommentService", 0.9),
            similar("Service/CommentService", "API/CommentAPI", 0.9),
        ]
    }

    #[tokio::test]
    async fn repository_explains_up_to_the_api() {
        let filter = TargetFilter::parse("API").unwrap();
        assert_eq!(filter.layer, Some(Layer::Api));
        let path = explainer(comment_chain())
            .explain("Repo/CommentRepository", Some(&filter), 3)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            path.nodes,
            vec!["Repo/CommentRepository", "Service/CommentService", "API/CommentAPI"]
        );
    }

    #[tokio::test]
    async fn downstream_path_beats_a_heavier_climb() {
        let mut edges = comment_chain();
        // heavier route to an API, but it climbs through the repository
        edges.push(similar("UseCase/CommentInputUseCase", "API/PostAPI", 0.95));
        let path = explainer(edges)
            .explain("Service/CommentService", Some(&TargetFilter::for_layer(Layer::Api)), 3)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(path.nodes, vec!["Service/CommentService", "API/CommentAPI"]);
    }

    #[tokio::test]
    async fn unfiltered_takes_the_heaviest_path() {
        let path = explainer(comment_chain())
            .explain("Repo/CommentRepository", None, 2)
            .await
            .unwrap()
            .unwrap();
        // 0.9 + 0.9 via the service outweighs any single hop
        assert_eq!(path.target(), "API/CommentAPI");
        assert_eq!(path.hops(), 2);
    }

    #[tokio::test]
    async fn no_matching_target_is_none() {
        let filter = TargetFilter::parse("Controller").unwrap();
        assert_eq!(filter.layer, None);
        let path = explainer(comment_chain())
            .explain("Repo/CommentRepository", Some(&filter), 3)
            .await
            .unwrap();
        assert!(path.is_none());
    }
}
