use anyhow::{Context, Result};
use tracing::info;

use rootseek_config::GraphConfig;
use rootseek_core::{
    merge_edges, normalize_node_id, CodeNode, Edge, NodeId, RelationType, SemanticBackend,
};

/// Nearest neighbours of one node with their similarity in [0,1].
#[derive(Debug, Clone, PartialEq)]
pub struct NeighborList {
    pub node_id: NodeId,
    pub neighbors: Vec<(NodeId, f32)>,
}

/// Outcome counts of one build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimilarityStats {
    pub created: usize,
    pub skipped: usize,
}

/// Turns nearest-neighbour lists into undirected `SIMILAR_TO` edges.
///
/// Neighbours below the threshold are skipped, self matches dropped, and
/// each unordered pair yields one edge carrying the higher score.
#[derive(Debug, Clone)]
pub struct SimilarityEdgeBuilder {
    threshold: f32,
    per_node: usize,
}

impl SimilarityEdgeBuilder {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            per_node: 5,
        }
    }

    pub fn from_config(config: &GraphConfig) -> Self {
        Self::new(config.similarity_threshold)
    }

    /// Neighbours considered per node.
    pub fn per_node(mut self, per_node: usize) -> Self {
        self.per_node = per_node;
        self
    }

    pub fn build(&self, lists: &[NeighborList]) -> (Vec<Edge>, SimilarityStats) {
        let mut stats = SimilarityStats::default();
        let mut edges = Vec::new();

        for list in lists {
            let source = normalize_node_id(&list.node_id);
            let candidates = list
                .neighbors
                .iter()
                .filter(|(id, _)| normalize_node_id(id) != source)
                .take(self.per_node);
            for (target, score) in candidates {
                if *score < self.threshold {
                    stats.skipped += 1;
                    continue;
                }
                let weight = (score * 1000.0).round() / 1000.0;
                if let Ok(edge) = Edge::new(&source, target, RelationType::SimilarTo, weight) {
                    edges.push(edge);
                }
            }
        }

        let edges = merge_edges(edges);
        stats.created = edges.len();
        info!(
            created = stats.created,
            skipped = stats.skipped,
            threshold = self.threshold,
            "similarity edges built"
        );
        (edges, stats)
    }

    /// Ask the semantic backend for every node's neighbours, using the
    /// node summary as query text when present.
    pub async fn collect(
        &self,
        backend: &dyn SemanticBackend,
        nodes: &[CodeNode],
    ) -> Result<Vec<NeighborList>> {
        let mut lists = Vec::with_capacity(nodes.len());
        for node in nodes {
            let text = node.summary.as_deref().unwrap_or(&node.id);
            let matches = backend
                .embed_search(text, self.per_node + 1)
                .await
                .with_context(|| format!("neighbour search failed for {}", node.id))?;
            lists.push(NeighborList {
                node_id: node.id.clone(),
                neighbors: matches
                    .into_iter()
                    .map(|m| (normalize_node_id(&m.path), (1.0 - m.distance).clamp(0.0, 1.0)))
                    .collect(),
            });
        }
        Ok(lists)
    }
}

impl Default for SimilarityEdgeBuilder {
    fn default() -> Self {
        Self::from_config(&GraphConfig::default())
    }
}
