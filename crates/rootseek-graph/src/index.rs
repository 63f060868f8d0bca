use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use itertools::Itertools;
use tracing::{debug, warn};

use rootseek_config::GraphConfig;
use rootseek_core::timeout::bounded;
use rootseek_core::{
    merge_edges, CodeNode, GraphBackend, GraphPath, GraphQuery, GraphRows, LayerClassifier,
    LayerPriority, NodeId, RelationType, RetrievalError, TraversalPath,
};

use crate::path::{compare_paths, enumerate_paths, LocalGraph, PathLimits};

type IndexResult<T> = std::result::Result<T, RetrievalError>;

/// Paths around a node plus the node records seen while walking them.
#[derive(Debug, Clone, Default)]
pub struct Reach {
    pub paths: Vec<TraversalPath>,
    pub nodes: HashMap<NodeId, CodeNode>,
}

/// Typed, weighted view over a graph backend.
///
/// Only the two canonical query shapes are sent to the backend. Cycle
/// safety and ordering are enforced here whatever the backend returns.
pub struct RelationIndex {
    backend: Arc<dyn GraphBackend>,
    classifier: Arc<LayerClassifier>,
    default_relations: Option<Vec<RelationType>>,
    max_hops: usize,
    max_paths: usize,
    timeout: Duration,
}

impl RelationIndex {
    pub fn new(
        backend: Arc<dyn GraphBackend>,
        classifier: Arc<LayerClassifier>,
        config: &GraphConfig,
        timeout: Duration,
    ) -> Self {
        let default_relations = if config.relations.is_empty() {
            None
        } else {
            Some(
                config
                    .relations
                    .iter()
                    .map(|r| RelationType::from(r.as_str()))
                    .collect(),
            )
        };
        Self {
            backend,
            classifier,
            default_relations,
            max_hops: config.max_hops,
            max_paths: config.max_paths,
            timeout,
        }
    }

    pub fn classifier(&self) -> &LayerClassifier {
        &self.classifier
    }

    pub fn default_max_hops(&self) -> usize {
        self.max_hops
    }

    async fn call(&self, query: GraphQuery) -> IndexResult<GraphRows> {
        bounded(self.timeout, "graph query", self.backend.query(query))
            .await
            .map_err(|e| {
                warn!(error = %format!("{e:#}"), "graph backend failed");
                RetrievalError::index(&e)
            })
    }

    async fn traverse(
        &self,
        sources: Vec<NodeId>,
        relations: Option<Vec<RelationType>>,
        max_hops: usize,
    ) -> IndexResult<Vec<GraphPath>> {
        let rows = self
            .call(GraphQuery::Traverse {
                sources,
                targets: None,
                relations,
                max_hops,
            })
            .await?;
        match rows {
            GraphRows::Paths(paths) => Ok(paths),
            GraphRows::Nodes(nodes) if nodes.is_empty() => Ok(Vec::new()),
            GraphRows::Nodes(_) => Err(RetrievalError::IndexUnavailable {
                reason: "backend answered a traversal with node rows".to_string(),
            }),
        }
    }

    fn resolve_relations(&self, relations: Option<&[RelationType]>) -> Option<Vec<RelationType>> {
        relations
            .map(<[RelationType]>::to_vec)
            .or_else(|| self.default_relations.clone())
    }

    /// Simple paths leaving `node_id` within `max_hops`.
    ///
    /// Ordered by hop count, then descending total weight, then the target's
    /// layer priority (higher first), then node sequence.
    pub async fn neighbors(
        &self,
        node_id: &str,
        relations: Option<&[RelationType]>,
        max_hops: usize,
    ) -> IndexResult<Vec<TraversalPath>> {
        Ok(self.reach(node_id, relations, max_hops).await?.paths)
    }

    /// Like [`neighbors`](Self::neighbors), also returning the nodes the
    /// backend described along the way.
    pub async fn reach(
        &self,
        node_id: &str,
        relations: Option<&[RelationType]>,
        max_hops: usize,
    ) -> IndexResult<Reach> {
        let relations = self.resolve_relations(relations);
        let rows = self
            .traverse(vec![node_id.to_string()], relations.clone(), max_hops)
            .await?;

        let mut nodes: HashMap<NodeId, CodeNode> = HashMap::new();
        let mut edges = Vec::new();
        for row in rows {
            for node in row.nodes {
                nodes.entry(node.id.clone()).or_insert(node);
            }
            edges.extend(row.edges);
        }

        let local = LocalGraph::from_edges(edges);
        let limits = PathLimits {
            max_hops,
            max_paths: self.max_paths,
        };
        let mut paths = enumerate_paths(&local, node_id, None, relations.as_deref(), limits);
        let priority = |id: &str| self.priority_in(&nodes, id);
        paths.sort_by(|a, b| compare_paths(a, b, &priority));

        debug!(node = node_id, paths = paths.len(), max_hops, "neighbors");
        Ok(Reach { paths, nodes })
    }

    /// Layer priority of `id`, using the node's own tag when known.
    pub fn priority_in(&self, nodes: &HashMap<NodeId, CodeNode>, id: &str) -> LayerPriority {
        match nodes.get(id) {
            Some(node) => self.classifier.priority_of(node),
            None => self.classifier.classify(id),
        }
    }

    /// Round trip to the backend without using the rows.
    pub async fn check(&self) -> IndexResult<()> {
        self.call(GraphQuery::RankByLayer {
            prefix: String::new(),
        })
        .await
        .map(|_| ())
    }

    /// Nodes under `prefix`, highest layer priority first, then by path.
    ///
    /// The order is total, so it does not depend on the backend's row order.
    pub async fn rank_by_layer(&self, prefix: &str) -> IndexResult<Vec<CodeNode>> {
        let rows = self
            .call(GraphQuery::RankByLayer {
                prefix: prefix.to_string(),
            })
            .await?;
        let nodes = match rows {
            GraphRows::Nodes(nodes) => nodes,
            GraphRows::Paths(paths) => paths.into_iter().flat_map(|p| p.nodes).collect(),
        };

        let mut unique: BTreeMap<NodeId, CodeNode> = BTreeMap::new();
        for node in nodes {
            unique.entry(node.id.clone()).or_insert(node);
        }

        let ranked: Vec<CodeNode> = unique
            .into_values()
            .map(|node| (self.classifier.priority_of(&node), node))
            .sorted_by(|(pa, a), (pb, b)| pb.cmp(pa).then_with(|| a.id.cmp(&b.id)))
            .map(|(_, node)| node)
            .collect();
        debug!(prefix, nodes = ranked.len(), "rank_by_layer");
        Ok(ranked)
    }

    /// Most connected nodes over `relations`, counting distinct neighbours
    /// in either direction.
    pub async fn hubs(
        &self,
        relations: Option<&[RelationType]>,
        limit: usize,
    ) -> IndexResult<Vec<(CodeNode, usize)>> {
        let nodes = self.rank_by_layer("").await?;
        if nodes.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let relations = self.resolve_relations(relations);
        let sources = nodes.iter().map(|n| n.id.clone()).collect();
        let rows = self.traverse(sources, relations.clone(), 1).await?;

        let edges = merge_edges(rows.into_iter().flat_map(|p| p.edges)).into_iter().filter(|e| {
            relations
                .as_ref()
                .map_or(true, |allowed| allowed.contains(&e.relation))
        });
        let mut adjacent: BTreeMap<NodeId, BTreeSet<NodeId>> = BTreeMap::new();
        for edge in edges {
            if edge.source == edge.target {
                continue;
            }
            adjacent
                .entry(edge.source.clone())
                .or_default()
                .insert(edge.target.clone());
            adjacent.entry(edge.target).or_default().insert(edge.source);
        }

        let hubs = nodes
            .into_iter()
            .filter_map(|node| {
                let degree = adjacent.get(&node.id).map_or(0, BTreeSet::len);
                (degree > 0).then_some((node, degree))
            })
            .sorted_by(|(a, da), (b, db)| db.cmp(da).then_with(|| a.id.cmp(&b.id)))
            .take(limit)
            .collect();
        Ok(hubs)
    }
}
