use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RetrievalError;
use crate::models::{CodeNode, Edge, NodeId, RelationType, RetrievalHit, Strategy};

/// A line matched by the literal search tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LexicalMatch {
    pub path: String,
    pub line: usize,
    pub text: String,
}

#[async_trait]
pub trait LexicalBackend: Send + Sync {
    async fn find(&self, pattern: &str, scope: Option<&str>) -> Result<Vec<LexicalMatch>>;
}

/// A nearest-neighbour result; smaller distance is closer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticMatch {
    pub path: String,
    pub distance: f32,
}

#[async_trait]
pub trait SemanticBackend: Send + Sync {
    /// Results are expected sorted by ascending distance.
    async fn embed_search(&self, text: &str, top_k: usize) -> Result<Vec<SemanticMatch>>;
}

/// The two query shapes a graph backend must answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GraphQuery {
    /// Nodes under a path prefix; an empty prefix selects every node.
    RankByLayer { prefix: String },
    /// Bounded walks from `sources`, optionally ending in `targets`, over
    /// the given relations (all when `None`).
    Traverse {
        sources: Vec<NodeId>,
        targets: Option<Vec<NodeId>>,
        relations: Option<Vec<RelationType>>,
        max_hops: usize,
    },
}

/// One walk returned by the backend, `edges[i]` joining `nodes[i]` and `nodes[i + 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphPath {
    pub nodes: Vec<CodeNode>,
    pub edges: Vec<Edge>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GraphRows {
    Nodes(Vec<CodeNode>),
    Paths(Vec<GraphPath>),
}

#[async_trait]
pub trait GraphBackend: Send + Sync {
    async fn query(&self, query: GraphQuery) -> Result<GraphRows>;
}

/// A prior candidate handed to a later strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Seed {
    pub node_id: NodeId,
    pub score: f32,
}

/// Everything a retriever may need; each strategy reads its own fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievalRequest {
    pub text: Option<String>,
    pub pattern: Option<String>,
    pub scope: Option<String>,
    /// Candidates from earlier strategies, best first.
    pub seeds: Vec<Seed>,
    pub top_k: usize,
    pub max_hops: usize,
}

/// Hits of one strategy call plus the condition that cut it short, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalOutcome {
    pub strategy: Strategy,
    pub hits: Vec<RetrievalHit>,
    pub condition: Option<RetrievalError>,
}

impl RetrievalOutcome {
    pub fn ok(strategy: Strategy, hits: Vec<RetrievalHit>) -> Self {
        Self {
            strategy,
            hits,
            condition: None,
        }
    }

    pub fn unavailable(strategy: Strategy, condition: RetrievalError) -> Self {
        Self {
            strategy,
            hits: Vec::new(),
            condition: Some(condition),
        }
    }

    pub fn is_available(&self) -> bool {
        self.condition.is_none()
    }
}

/// Common face of the three strategies.
#[async_trait]
pub trait Retriever: Send + Sync {
    fn strategy(&self) -> Strategy;

    /// Never fails; backend trouble is reported through `condition`.
    async fn retrieve(&self, request: &RetrievalRequest) -> RetrievalOutcome;
}
