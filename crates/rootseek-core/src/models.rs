use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use rootseek_config::RankingConfig;

/// Normalized file path identifying a node.
pub type NodeId = String;

/// Forward slashes, no leading `./`, no trailing `/`, no empty segments.
pub fn normalize_node_id(raw: &str) -> NodeId {
    let unified = raw.trim().replace('\\', "/");
    unified
        .split('/')
        .filter(|seg| !seg.is_empty() && *seg != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Architectural role of a file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    Repository,
    UseCase,
    Service,
    Api,
    #[default]
    Other,
}

impl Layer {
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "repository" | "repo" => Layer::Repository,
            "use_case" | "usecase" => Layer::UseCase,
            "service" => Layer::Service,
            "api" => Layer::Api,
            _ => Layer::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::Repository => "repository",
            Layer::UseCase => "use_case",
            Layer::Service => "service",
            Layer::Api => "api",
            Layer::Other => "other",
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A graph vertex: one source file plus its layer tag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CodeNode {
    pub id: NodeId,
    #[serde(default)]
    pub layer: Layer,
    #[serde(default)]
    pub summary: Option<String>,
    /// Id of this file in the semantic index.
    #[serde(default)]
    pub embedding_ref: Option<String>,
    /// Logical module (e.g. top-level directory) for BELONGS_TO edges.
    #[serde(default)]
    pub module: Option<String>,
}

impl CodeNode {
    pub fn new(id: &str) -> Self {
        Self {
            id: normalize_node_id(id),
            layer: Layer::Other,
            summary: None,
            embedding_ref: None,
            module: None,
        }
    }

    pub fn with_layer(mut self, layer: Layer) -> Self {
        self.layer = layer;
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    /// Last path segment.
    pub fn file_name(&self) -> &str {
        self.id.rsplit('/').next().unwrap_or(&self.id)
    }
}

/// Edge relation. Unknown relations are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RelationType {
    SimilarTo,
    Calls,
    Imports,
    BelongsTo,
    Other(String),
}

impl RelationType {
    pub fn as_str(&self) -> &str {
        match self {
            RelationType::SimilarTo => "SIMILAR_TO",
            RelationType::Calls => "CALLS",
            RelationType::Imports => "IMPORTS",
            RelationType::BelongsTo => "BELONGS_TO",
            RelationType::Other(name) => name,
        }
    }

    /// SIMILAR_TO is symmetric; everything else has a direction.
    pub fn is_undirected(&self) -> bool {
        matches!(self, RelationType::SimilarTo)
    }
}

impl From<&str> for RelationType {
    fn from(raw: &str) -> Self {
        let name = raw.trim().to_uppercase().replace(['-', ' '], "_");
        match name.as_str() {
            "SIMILAR_TO" => RelationType::SimilarTo,
            "CALLS" => RelationType::Calls,
            "IMPORTS" => RelationType::Imports,
            "BELONGS_TO" => RelationType::BelongsTo,
            _ => RelationType::Other(name),
        }
    }
}

impl From<String> for RelationType {
    fn from(raw: String) -> Self {
        RelationType::from(raw.as_str())
    }
}

impl From<RelationType> for String {
    fn from(rel: RelationType) -> Self {
        rel.as_str().to_string()
    }
}

impl fmt::Display for RelationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed, weighted relationship between two nodes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Edge {
    pub source: NodeId,
    pub target: NodeId,
    pub relation: RelationType,
    pub weight: f32,
}

impl Edge {
    /// Build an edge with normalized endpoints and the weight clamped to [0,1].
    pub fn new(
        source: &str,
        target: &str,
        relation: RelationType,
        weight: f32,
    ) -> anyhow::Result<Self> {
        let source = normalize_node_id(source);
        let target = normalize_node_id(target);
        let weight = if weight.is_nan() { 0.0 } else { weight.clamp(0.0, 1.0) };
        if source == target && weight == 0.0 {
            anyhow::bail!("rejected zero-weight self-loop on {source}");
        }
        Ok(Self {
            source,
            target,
            relation,
            weight,
        })
    }

    /// Identity used for duplicate detection; undirected edges use the
    /// ordered pair.
    pub fn key(&self) -> (RelationType, NodeId, NodeId) {
        if self.relation.is_undirected() && self.target < self.source {
            (self.relation.clone(), self.target.clone(), self.source.clone())
        } else {
            (self.relation.clone(), self.source.clone(), self.target.clone())
        }
    }

    /// The endpoint opposite `node` if this edge can be walked from it.
    pub fn walk_from(&self, node: &str) -> Option<&str> {
        if self.source == node {
            Some(&self.target)
        } else if self.relation.is_undirected() && self.target == node {
            Some(&self.source)
        } else {
            None
        }
    }
}

/// Collapse duplicate edges keeping the highest weight, sorted by key.
pub fn merge_edges(edges: impl IntoIterator<Item = Edge>) -> Vec<Edge> {
    let mut merged: BTreeMap<(RelationType, NodeId, NodeId), Edge> = BTreeMap::new();
    for edge in edges {
        let key = edge.key();
        match merged.get_mut(&key) {
            Some(existing) if existing.weight >= edge.weight => {}
            Some(existing) => existing.weight = edge.weight,
            None => {
                merged.insert(key, edge);
            }
        }
    }
    merged.into_values().collect()
}

/// Retrieval method. Declaration order is the tie-break order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Semantic,
    Graph,
    Lexical,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [Strategy::Semantic, Strategy::Graph, Strategy::Lexical];

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Semantic => "semantic",
            Strategy::Graph => "graph",
            Strategy::Lexical => "lexical",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One strategy's evidence for one node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalHit {
    pub node_id: NodeId,
    pub strategy: Strategy,
    pub raw_score: f32,
    /// Always within [0,1].
    pub normalized_score: f32,
    pub line: Option<usize>,
    pub snippet: Option<String>,
}

impl RetrievalHit {
    pub fn new(node_id: &str, strategy: Strategy, raw_score: f32, normalized_score: f32) -> Self {
        let normalized_score = if normalized_score.is_nan() {
            0.0
        } else {
            normalized_score.clamp(0.0, 1.0)
        };
        Self {
            node_id: normalize_node_id(node_id),
            strategy,
            raw_score,
            normalized_score,
            line: None,
            snippet: None,
        }
    }

    pub fn with_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }
}

/// Strategy weights and the layer bonus divisor used for composite scores.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankingWeights {
    pub semantic: f32,
    pub graph: f32,
    pub lexical: f32,
    pub layer_bonus_divisor: f32,
}

impl RankingWeights {
    pub fn weight(&self, strategy: Strategy) -> f32 {
        match strategy {
            Strategy::Semantic => self.semantic,
            Strategy::Graph => self.graph,
            Strategy::Lexical => self.lexical,
        }
    }

    pub fn weighted(&self, hit: &RetrievalHit) -> f32 {
        self.weight(hit.strategy) * hit.normalized_score
    }

    pub fn layer_bonus(&self, priority: u32) -> f32 {
        if self.layer_bonus_divisor > 0.0 {
            priority as f32 / self.layer_bonus_divisor
        } else {
            0.0
        }
    }
}

impl From<&RankingConfig> for RankingWeights {
    fn from(config: &RankingConfig) -> Self {
        Self {
            semantic: config.semantic,
            graph: config.graph,
            lexical: config.lexical,
            layer_bonus_divisor: config.layer_bonus_divisor,
        }
    }
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self::from(&RankingConfig::default())
    }
}

/// A node after fusion of all strategies' hits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankedCandidate {
    pub node_id: NodeId,
    pub composite_score: f32,
    pub contributing_hits: Vec<RetrievalHit>,
    pub layer_priority: u32,
}

impl RankedCandidate {
    /// Composite score from the contributing hits and the layer priority.
    pub fn recompute(&self, weights: &RankingWeights) -> f32 {
        let best = self
            .contributing_hits
            .iter()
            .map(|hit| weights.weighted(hit))
            .fold(0.0_f32, f32::max);
        best + weights.layer_bonus(self.layer_priority)
    }

    /// Distinct strategies that produced a hit, in tie-break order.
    pub fn strategies(&self) -> Vec<Strategy> {
        let mut strategies: Vec<Strategy> =
            self.contributing_hits.iter().map(|h| h.strategy).collect();
        strategies.sort();
        strategies.dedup();
        strategies
    }

    /// Best weighted score this candidate got from `strategy`.
    pub fn strategy_score(&self, strategy: Strategy, weights: &RankingWeights) -> Option<f32> {
        self.contributing_hits
            .iter()
            .filter(|h| h.strategy == strategy)
            .map(|h| weights.weighted(h))
            .reduce(f32::max)
    }
}

/// Relation and weight of one hop.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PathStep {
    pub relation: RelationType,
    pub weight: f32,
}

/// An acyclic walk: `nodes[i]` and `nodes[i + 1]` are joined by `steps[i]`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TraversalPath {
    pub nodes: Vec<NodeId>,
    pub steps: Vec<PathStep>,
}

impl TraversalPath {
    pub fn start(node: &str) -> Self {
        Self {
            nodes: vec![node.to_string()],
            steps: Vec::new(),
        }
    }

    /// Append a hop; `None` if `node` is already on the path.
    pub fn extend(&self, node: &str, step: PathStep) -> Option<Self> {
        if self.contains(node) {
            return None;
        }
        let mut next = self.clone();
        next.nodes.push(node.to_string());
        next.steps.push(step);
        Some(next)
    }

    pub fn seed(&self) -> &str {
        self.nodes.first().map(String::as_str).unwrap_or_default()
    }

    pub fn target(&self) -> &str {
        self.nodes.last().map(String::as_str).unwrap_or_default()
    }

    pub fn hops(&self) -> usize {
        self.steps.len()
    }

    pub fn total_weight(&self) -> f32 {
        self.steps.iter().map(|s| s.weight).sum()
    }

    pub fn weight_product(&self) -> f32 {
        self.steps.iter().map(|s| s.weight).product()
    }

    pub fn contains(&self, node: &str) -> bool {
        self.nodes.iter().any(|n| n == node)
    }

    /// `a -> b -> c`
    pub fn render(&self) -> String {
        let mut out = self.seed().to_string();
        for (node, step) in self.nodes.iter().skip(1).zip(&self.steps) {
            out.push_str(&format!(" -[{}]-> {}", step.relation, node));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_ids_are_normalized() {
        assert_eq!(normalize_node_id("./src\\api//CommentAPI.kt/"), "src/api/CommentAPI.kt");
        assert_eq!(CodeNode::new("./Repo/CommentRepository").id, "Repo/CommentRepository");
        assert_eq!(CodeNode::new("a/b/c.rs").file_name(), "c.rs");
    }

    #[test]
    fn relation_types_round_trip_through_strings() {
        assert_eq!(RelationType::from("similar-to"), RelationType::SimilarTo);
        assert_eq!(
            RelationType::from("depends on"),
            RelationType::Other("DEPENDS_ON".to_string())
        );
        let json = serde_json::to_string(&RelationType::BelongsTo).unwrap();
        assert_eq!(json, "\"BELONGS_TO\"");
        let back: RelationType = serde_json::from_str("\"calls\"").unwrap();
        assert_eq!(back, RelationType::Calls);
    }

    #[test]
    fn edge_weight_is_clamped_and_zero_self_loop_rejected() {
        let e = Edge::new("a", "b", RelationType::Calls, 1.7).unwrap();
        assert_eq!(e.weight, 1.0);
        assert!(Edge::new("a", "./a", RelationType::SimilarTo, 0.0).is_err());
        assert!(Edge::new("a", "a", RelationType::SimilarTo, 0.4).is_ok());
    }

    #[test]
    fn undirected_duplicates_merge_to_max_weight() {
        let edges = vec![
            Edge::new("b", "a", RelationType::SimilarTo, 0.8).unwrap(),
            Edge::new("a", "b", RelationType::SimilarTo, 0.9).unwrap(),
            Edge::new("a", "b", RelationType::Calls, 0.3).unwrap(),
            Edge::new("b", "a", RelationType::Calls, 0.5).unwrap(),
        ];
        let merged = merge_edges(edges);
        assert_eq!(merged.len(), 3);
        let similar: Vec<_> = merged
            .iter()
            .filter(|e| e.relation == RelationType::SimilarTo)
            .collect();
        assert_eq!(similar.len(), 1);
        assert!((similar[0].weight - 0.9).abs() < 1e-6);
    }

    #[test]
    fn walk_respects_direction() {
        let calls = Edge::new("a", "b", RelationType::Calls, 0.5).unwrap();
        assert_eq!(calls.walk_from("a"), Some("b"));
        assert_eq!(calls.walk_from("b"), None);
        let similar = Edge::new("a", "b", RelationType::SimilarTo, 0.5).unwrap();
        assert_eq!(similar.walk_from("b"), Some("a"));
    }

    #[test]
    fn path_extension_refuses_repeats() {
        let step = PathStep {
            relation: RelationType::SimilarTo,
            weight: 0.9,
        };
        let path = TraversalPath::start("a").extend("b", step.clone()).unwrap();
        assert!(path.extend("a", step.clone()).is_none());
        let path = path.extend("c", step).unwrap();
        assert_eq!(path.hops(), 2);
        assert!((path.total_weight() - 1.8).abs() < 1e-6);
        assert_eq!(path.render(), "a -[SIMILAR_TO]-> b -[SIMILAR_TO]-> c");
    }

    #[test]
    fn recompute_matches_max_weighted_plus_bonus() {
        let candidate = RankedCandidate {
            node_id: "x".into(),
            composite_score: 0.0,
            contributing_hits: vec![
                RetrievalHit::new("x", Strategy::Semantic, 0.1, 0.5),
                RetrievalHit::new("x", Strategy::Lexical, 3.0, 0.9),
            ],
            layer_priority: 5,
        };
        let weights = RankingWeights::default();
        let expected = (0.8 * 0.9) + 5.0 / 50.0;
        assert!((candidate.recompute(&weights) - expected).abs() < 1e-6);
        assert_eq!(candidate.strategies(), vec![Strategy::Semantic, Strategy::Lexical]);
    }
}
