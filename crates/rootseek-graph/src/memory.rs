use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableGraph;
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::debug;

use rootseek_core::{
    normalize_node_id, CodeNode, Edge, GraphBackend, GraphPath, GraphQuery, GraphRows, NodeId,
    PathStep, RelationType, TraversalPath,
};

use crate::path::{enumerate_paths, Neighborhood, PathLimits};

const DEFAULT_MAX_PATHS: usize = 256;
const TOP_SIMILAR: usize = 5;

/// Serializable form of a graph: node list plus edge list.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GraphSnapshot {
    pub nodes: Vec<CodeNode>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct EdgeData {
    relation: RelationType,
    weight: f32,
}

/// Counts over the whole graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GraphStats {
    pub nodes: usize,
    pub edges: usize,
    pub edges_by_relation: BTreeMap<String, usize>,
    /// Modules with the most member files, largest first.
    pub top_modules: Vec<(String, usize)>,
    /// Strongest `SIMILAR_TO` pairs, highest weight first.
    pub top_similar: Vec<(NodeId, NodeId, f32)>,
}

/// In-memory graph backend over a petgraph `StableGraph`.
///
/// Read-only once built; share it behind an `Arc`.
pub struct CodeGraph {
    graph: StableGraph<CodeNode, EdgeData>,
    node_indices: HashMap<NodeId, NodeIndex>,
    max_paths: usize,
}

impl CodeGraph {
    pub fn new() -> Self {
        Self {
            graph: StableGraph::new(),
            node_indices: HashMap::new(),
            max_paths: DEFAULT_MAX_PATHS,
        }
    }

    /// Cap on paths returned per traversal query.
    pub fn with_max_paths(mut self, max_paths: usize) -> Self {
        self.max_paths = max_paths;
        self
    }

    pub fn from_snapshot(snapshot: GraphSnapshot) -> Result<Self> {
        let mut graph = Self::new();
        for node in snapshot.nodes {
            graph.add_node(node);
        }
        for edge in snapshot.edges {
            graph.add_edge(edge)?;
        }
        Ok(graph)
    }

    pub fn to_snapshot(&self) -> GraphSnapshot {
        let mut nodes: Vec<CodeNode> = self.nodes().cloned().collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        GraphSnapshot {
            nodes,
            edges: self.edges(),
        }
    }

    pub fn load_json(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("failed to open graph snapshot {}", path.display()))?;
        let snapshot: GraphSnapshot = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("failed to parse graph snapshot {}", path.display()))?;
        Self::from_snapshot(snapshot)
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .with_context(|| format!("failed to create graph snapshot {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &self.to_snapshot())
            .context("failed to serialize graph snapshot")?;
        Ok(())
    }

    /// Insert a node; an id seen before keeps its first definition.
    pub fn add_node(&mut self, mut node: CodeNode) -> NodeIndex {
        node.id = normalize_node_id(&node.id);
        if let Some(idx) = self.node_indices.get(&node.id) {
            return *idx;
        }
        let id = node.id.clone();
        let idx = self.graph.add_node(node);
        self.node_indices.insert(id, idx);
        idx
    }

    /// Insert an edge between known nodes, merging duplicates to the max weight.
    pub fn add_edge(&mut self, edge: Edge) -> Result<()> {
        let Some(&src) = self.node_indices.get(&edge.source) else {
            bail!("edge source {} is not a node", edge.source);
        };
        let Some(&dst) = self.node_indices.get(&edge.target) else {
            bail!("edge target {} is not a node", edge.target);
        };
        if src == dst && edge.weight == 0.0 {
            bail!("rejected zero-weight self-loop on {}", edge.source);
        }

        let mut existing = self
            .graph
            .edges_connecting(src, dst)
            .find(|e| e.weight().relation == edge.relation)
            .map(|e| e.id());
        if existing.is_none() && edge.relation.is_undirected() {
            existing = self
                .graph
                .edges_connecting(dst, src)
                .find(|e| e.weight().relation == edge.relation)
                .map(|e| e.id());
        }

        match existing.and_then(|id| self.graph.edge_weight_mut(id)) {
            Some(data) => data.weight = data.weight.max(edge.weight),
            None => {
                self.graph.add_edge(
                    src,
                    dst,
                    EdgeData {
                        relation: edge.relation,
                        weight: edge.weight,
                    },
                );
            }
        }
        Ok(())
    }

    /// Add one module node per distinct `module` attribute and a
    /// `BELONGS_TO` edge from every member file.
    ///
    /// Files without a module attribute belong to their first directory,
    /// or to `Root` when they sit at the top level.
    pub fn link_modules(&mut self) -> Result<usize> {
        let members: Vec<(NodeId, String)> = self
            .nodes()
            .filter(|n| !n.id.starts_with(MODULE_PREFIX))
            .map(|n| (n.id.clone(), n.module.clone().unwrap_or_else(|| module_of(&n.id))))
            .collect();

        let mut linked = 0;
        for (file, module) in members {
            let module_id = format!("{MODULE_PREFIX}{module}");
            self.add_node(CodeNode::new(&module_id).with_module(module));
            self.add_edge(Edge::new(&file, &module_id, RelationType::BelongsTo, 1.0)?)?;
            linked += 1;
        }
        debug!(linked, "linked files to modules");
        Ok(linked)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &CodeNode> + '_ {
        self.graph
            .node_indices()
            .filter_map(|idx| self.graph.node_weight(idx))
    }

    pub fn node(&self, id: &str) -> Option<&CodeNode> {
        self.node_indices
            .get(id)
            .and_then(|idx| self.graph.node_weight(*idx))
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn edges(&self) -> Vec<Edge> {
        let mut edges: Vec<Edge> = self
            .graph
            .edge_references()
            .filter_map(|e| {
                let source = self.graph.node_weight(e.source())?;
                let target = self.graph.node_weight(e.target())?;
                Some(Edge {
                    source: source.id.clone(),
                    target: target.id.clone(),
                    relation: e.weight().relation.clone(),
                    weight: e.weight().weight,
                })
            })
            .collect();
        edges.sort_by(|a, b| a.key().cmp(&b.key()));
        edges
    }

    /// Nodes whose id, or any `/` segment of it, starts with `prefix`.
    pub fn nodes_under(&self, prefix: &str) -> Vec<CodeNode> {
        let prefix = normalize_node_id(prefix);
        let mut nodes: Vec<CodeNode> = self
            .nodes()
            .filter(|n| is_under(&n.id, &prefix))
            .cloned()
            .collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        nodes
    }

    pub fn stats(&self) -> GraphStats {
        let mut edges_by_relation = BTreeMap::new();
        let mut module_sizes: BTreeMap<String, usize> = BTreeMap::new();
        for e in self.graph.edge_references() {
            *edges_by_relation
                .entry(e.weight().relation.to_string())
                .or_insert(0) += 1;
            if e.weight().relation == RelationType::BelongsTo {
                if let Some(module) = self.graph.node_weight(e.target()) {
                    let name = module.id.trim_start_matches(MODULE_PREFIX).to_string();
                    *module_sizes.entry(name).or_insert(0) += 1;
                }
            }
        }
        let mut top_modules: Vec<(String, usize)> = module_sizes.into_iter().collect();
        top_modules.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        top_modules.truncate(10);

        let mut top_similar: Vec<(NodeId, NodeId, f32)> = self
            .edges()
            .into_iter()
            .filter(|e| e.relation == RelationType::SimilarTo)
            .map(|e| {
                let (_, a, b) = e.key();
                (a, b, e.weight)
            })
            .collect();
        top_similar.sort_by(|a, b| {
            b.2.total_cmp(&a.2)
                .then_with(|| a.0.cmp(&b.0))
                .then_with(|| a.1.cmp(&b.1))
        });
        top_similar.truncate(TOP_SIMILAR);

        GraphStats {
            nodes: self.node_count(),
            edges: self.edge_count(),
            edges_by_relation,
            top_modules,
            top_similar,
        }
    }

    fn to_graph_path(&self, path: &TraversalPath) -> Option<GraphPath> {
        let nodes = path
            .nodes
            .iter()
            .map(|id| self.node(id).cloned())
            .collect::<Option<Vec<_>>>()?;
        let edges = path
            .nodes
            .windows(2)
            .zip(&path.steps)
            .map(|(pair, step)| Edge {
                source: pair[0].clone(),
                target: pair[1].clone(),
                relation: step.relation.clone(),
                weight: step.weight,
            })
            .collect();
        Some(GraphPath { nodes, edges })
    }

    fn traverse(
        &self,
        sources: &[NodeId],
        targets: Option<&[NodeId]>,
        relations: Option<&[RelationType]>,
        max_hops: usize,
    ) -> Vec<GraphPath> {
        let targets: Option<HashSet<NodeId>> =
            targets.map(|t| t.iter().map(|id| normalize_node_id(id)).collect());
        let limits = PathLimits {
            max_hops,
            max_paths: self.max_paths,
        };
        let mut rows = Vec::new();
        for source in sources {
            let source = normalize_node_id(source);
            if !self.node_indices.contains_key(&source) {
                debug!(%source, "traversal source not in graph");
                continue;
            }
            for path in enumerate_paths(self, &source, targets.as_ref(), relations, limits) {
                if let Some(row) = self.to_graph_path(&path) {
                    rows.push(row);
                }
            }
        }
        rows
    }
}

impl Default for CodeGraph {
    fn default() -> Self {
        Self::new()
    }
}

const MODULE_PREFIX: &str = "module:";

fn module_of(id: &str) -> String {
    match id.split_once('/') {
        Some((first, _)) => first.to_string(),
        None => "Root".to_string(),
    }
}

fn is_under(id: &str, prefix: &str) -> bool {
    prefix.is_empty() || id.starts_with(prefix) || id.split('/').any(|seg| seg.starts_with(prefix))
}

impl Neighborhood for CodeGraph {
    fn steps_from(&self, node: &str) -> Vec<(NodeId, PathStep)> {
        let Some(&idx) = self.node_indices.get(node) else {
            return Vec::new();
        };
        let step = |data: &EdgeData| PathStep {
            relation: data.relation.clone(),
            weight: data.weight,
        };

        let mut steps: Vec<(NodeId, PathStep)> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .filter_map(|e| {
                let target = self.graph.node_weight(e.target())?;
                Some((target.id.clone(), step(e.weight())))
            })
            .collect();
        steps.extend(
            self.graph
                .edges_directed(idx, Direction::Incoming)
                .filter(|e| e.weight().relation.is_undirected() && e.source() != idx)
                .filter_map(|e| {
                    let source = self.graph.node_weight(e.source())?;
                    Some((source.id.clone(), step(e.weight())))
                }),
        );
        steps
    }
}

#[async_trait]
impl GraphBackend for CodeGraph {
    async fn query(&self, query: GraphQuery) -> Result<GraphRows> {
        match query {
            GraphQuery::RankByLayer { prefix } => Ok(GraphRows::Nodes(self.nodes_under(&prefix))),
            GraphQuery::Traverse {
                sources,
                targets,
                relations,
                max_hops,
            } => Ok(GraphRows::Paths(self.traverse(
                &sources,
                targets.as_deref(),
                relations.as_deref(),
                max_hops,
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rootseek_core::Layer;

    fn sample() -> CodeGraph {
        let snapshot = GraphSnapshot {
            nodes: vec![
                CodeNode::new("Repo/CommentRepository").with_layer(Layer::Repository),
                CodeNode::new("Service/CommentService").with_layer(Layer::Service),
                CodeNode::new("API/CommentAPI").with_layer(Layer::Api),
                CodeNode::new("README"),
            ],
            edges: vec![
                Edge::new("Repo/CommentRepository", "Service/CommentService", RelationType::SimilarTo, 0.9).unwrap(),
                Edge::new("Service/CommentService", "Repo/CommentRepository", RelationType::SimilarTo, 0.95).unwrap(),
                Edge::new("Service/CommentService", "API/CommentAPI", RelationType::Calls, 0.6).unwrap(),
            ],
        };
        CodeGraph::from_snapshot(snapshot).unwrap()
    }

    #[test]
    fn undirected_duplicates_are_merged() {
        let graph = sample();
        assert_eq!(graph.edge_count(), 2);
        let similar = graph
            .edges()
            .into_iter()
            .find(|e| e.relation == RelationType::SimilarTo)
            .unwrap();
        assert!((similar.weight - 0.95).abs() < 1e-6);
    }

    #[test]
    fn edges_to_unknown_nodes_fail() {
        let mut graph = sample();
        let err = graph
            .add_edge(Edge::new("API/CommentAPI", "Nope", RelationType::Calls, 0.5).unwrap())
            .unwrap_err();
        assert!(err.to_string().contains("Nope"));
    }

    #[test]
    fn prefix_matches_any_segment() {
        let graph = sample();
        let ids: Vec<_> = graph.nodes_under("Comment").into_iter().map(|n| n.id).collect();
        assert_eq!(
            ids,
            vec!["API/CommentAPI", "Repo/CommentRepository", "Service/CommentService"]
        );
        assert_eq!(graph.nodes_under("").len(), 4);
        assert_eq!(graph.nodes_under("Service").len(), 1);
    }

    #[test]
    fn similar_to_walks_both_ways_calls_one_way() {
        let graph = sample();
        let from_service: Vec<_> = graph
            .steps_from("Service/CommentService")
            .into_iter()
            .map(|(n, _)| n)
            .collect();
        assert_eq!(from_service.len(), 2);
        assert!(graph.steps_from("API/CommentAPI").is_empty());
    }

    #[tokio::test]
    async fn traverse_returns_reconstructed_paths() {
        let graph = sample();
        let rows = graph
            .query(GraphQuery::Traverse {
                sources: vec!["Repo/CommentRepository".into()],
                targets: Some(vec!["API/CommentAPI".into()]),
                relations: None,
                max_hops: 3,
            })
            .await
            .unwrap();
        let GraphRows::Paths(paths) = rows else {
            panic!("expected paths");
        };
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].nodes.len(), 3);
        assert_eq!(paths[0].edges[1].relation, RelationType::Calls);
    }

    #[test]
    fn modules_and_stats() {
        let mut graph = sample();
        assert_eq!(graph.link_modules().unwrap(), 4);
        let stats = graph.stats();
        assert_eq!(stats.edges_by_relation.get("BELONGS_TO"), Some(&4));
        assert_eq!(stats.top_modules.len(), 4);
        assert!(stats.top_modules.contains(&("Root".to_string(), 1)));
        assert!(graph.node("module:Repo").is_some());
    }

    #[test]
    fn stats_list_strongest_similar_pairs() {
        let mut graph = sample();
        graph.add_node(CodeNode::new("API/PostAPI"));
        graph
            .add_edge(Edge::new("API/PostAPI", "API/CommentAPI", RelationType::SimilarTo, 0.8).unwrap())
            .unwrap();
        let stats = graph.stats();
        assert_eq!(
            stats.top_similar,
            vec![
                ("Repo/CommentRepository".to_string(), "Service/CommentService".to_string(), 0.95),
                ("API/CommentAPI".to_string(), "API/PostAPI".to_string(), 0.8),
            ]
        );
    }

    #[test]
    fn snapshot_survives_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json");
        let graph = sample();
        graph.save_json(&path).unwrap();
        let loaded = CodeGraph::load_json(&path).unwrap();
        assert_eq!(loaded.to_snapshot(), graph.to_snapshot());
    }
}
