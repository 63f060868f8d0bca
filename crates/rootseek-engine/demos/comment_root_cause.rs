//! Locate why comment authors come back empty in a tiny layered project.
//!
//! Run with `ROOTSEEK_LOG=rootseek_engine=debug` to watch the planner.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;

use rootseek_config::Config;
use rootseek_core::{CodeNode, Layer, Query, RelationType, SemanticBackend, SemanticMatch};
use rootseek_engine::telemetry::init_tracing;
use rootseek_engine::{Backends, QueryPlanner};
use rootseek_graph::{CodeGraph, NeighborList, SimilarityEdgeBuilder};
use rootseek_retrieval::FsLiteralBackend;

const SOURCES: &[(&str, Layer, &str)] = &[
    (
        "Repo/CommentRepository.kt",
        Layer::Repository,
        "class CommentRepository(db: Db) {\n  fun load(id: Long) = db.row(id).let { Comment(it[\"body\"], it[\"author\"]) }\n}\n",
    ),
    (
        "UseCase/CommentInputUseCase.kt",
        Layer::UseCase,
        "class CommentInputUseCase(repo: CommentRepository) {\n  fun submit(c: Comment) = repo.save(c)\n}\n",
    ),
    (
        "Service/CommentService.kt",
        Layer::Service,
        "class CommentService(repo: CommentRepository) {\n  fun authorOf(id: Long) = repo.load(id).author_name\n}\n",
    ),
    (
        "API/CommentAPI.kt",
        Layer::Api,
        "@Get(\"/comments/{id}/author\")\nfun author(id: Long) = service.authorOf(id)\n",
    ),
];

/// Toy embedding search: distance is one minus word overlap.
struct WordOverlap {
    docs: Vec<(String, BTreeSet<String>)>,
}

fn words(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 2)
        .map(str::to_lowercase)
        .collect()
}

#[async_trait]
impl SemanticBackend for WordOverlap {
    async fn embed_search(&self, text: &str, top_k: usize) -> Result<Vec<SemanticMatch>> {
        let query = words(text);
        let mut matches: Vec<SemanticMatch> = self
            .docs
            .iter()
            .map(|(path, doc)| {
                let shared = query.intersection(doc).count() as f32;
                SemanticMatch {
                    path: path.clone(),
                    distance: 1.0 - shared / query.len().max(1) as f32,
                }
            })
            .collect();
        matches.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        matches.truncate(top_k);
        Ok(matches)
    }
}

fn write_tree(root: &Path) -> Result<()> {
    for (path, _, body) in SOURCES {
        let full = root.join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&full, body).with_context(|| format!("writing {}", full.display()))?;
    }
    Ok(())
}

fn build_graph(config: &Config) -> Result<CodeGraph> {
    let mut graph = CodeGraph::new();
    for (path, layer, _) in SOURCES {
        graph.add_node(CodeNode::new(path).with_layer(*layer));
    }
    let neighbours = vec![
        NeighborList {
            node_id: "Repo/CommentRepository.kt".into(),
            neighbors: vec![
                ("Service/CommentService.kt".into(), 0.91),
                ("UseCase/CommentInputUseCase.kt".into(), 0.88),
            ],
        },
        NeighborList {
            node_id: "Service/CommentService.kt".into(),
            neighbors: vec![
                ("API/CommentAPI.kt".into(), 0.86),
                ("Repo/CommentRepository.kt".into(), 0.91),
            ],
        },
        NeighborList {
            node_id: "API/CommentAPI.kt".into(),
            neighbors: vec![("UseCase/CommentInputUseCase.kt".into(), 0.41)],
        },
    ];
    let (edges, stats) = SimilarityEdgeBuilder::from_config(&config.graph).build(&neighbours);
    println!("similarity edges: {} created, {} below threshold", stats.created, stats.skipped);
    for edge in edges {
        graph.add_edge(edge)?;
    }
    Ok(graph)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let dir = tempfile::tempdir()?;
    write_tree(dir.path())?;

    let mut config = Config::default();
    config.graph.relations = vec![RelationType::SimilarTo.to_string()];

    let graph = build_graph(&config)?;
    let semantic = WordOverlap {
        docs: SOURCES
            .iter()
            .map(|(path, _, body)| (path.to_string(), words(body)))
            .collect(),
    };
    let planner = QueryPlanner::new(
        &config,
        Backends {
            lexical: Arc::new(FsLiteralBackend::new(dir.path(), &config.retrieval)?),
            semantic: Arc::new(semantic),
            graph: Arc::new(graph),
        },
    )?;

    let query = Query::text("comment author is empty, author_name never loaded").with_target("API");
    let answer = planner.answer(query).await?;

    println!("status: {:?}", answer.status);
    for candidate in &answer.candidates {
        println!(
            "{:>6.3}  {}  {:?}",
            candidate.composite_score,
            candidate.node_id,
            candidate.strategies()
        );
    }
    if let Some(path) = &answer.explanation {
        println!("path: {}", path.render());
    }
    for (node, degree) in planner.relation_index().hubs(None, 3).await? {
        println!("hub: {} ({degree} links)", node.id);
    }
    println!("{}", serde_json::to_string_pretty(&answer.trace)?);
    Ok(())
}
