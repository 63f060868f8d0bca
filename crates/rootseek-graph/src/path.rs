use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet, VecDeque};

use rootseek_core::{merge_edges, Edge, NodeId, PathStep, RelationType, TraversalPath};

/// Walks are abandoned once this many partial paths per requested path
/// have been queued.
const EXPANSION_BUDGET: usize = 64;

/// Anything that can list the hops leaving a node.
pub trait Neighborhood {
    fn steps_from(&self, node: &str) -> Vec<(NodeId, PathStep)>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathLimits {
    pub max_hops: usize,
    pub max_paths: usize,
}

/// Breadth-first enumeration of simple paths starting at `source`.
///
/// Only edges whose relation is in `relations` are followed (all when
/// `None`). A node already on the current path is never revisited, so
/// cycles terminate. When `targets` is given only paths ending at one of
/// them are returned, though the walk still passes through other nodes.
/// Results come out grouped by hop count.
pub fn enumerate_paths<G: Neighborhood + ?Sized>(
    graph: &G,
    source: &str,
    targets: Option<&HashSet<NodeId>>,
    relations: Option<&[RelationType]>,
    limits: PathLimits,
) -> Vec<TraversalPath> {
    let mut found = Vec::new();
    if limits.max_hops == 0 || limits.max_paths == 0 {
        return found;
    }

    let mut budget = limits.max_paths.saturating_mul(EXPANSION_BUDGET);
    let mut queue = VecDeque::from([TraversalPath::start(source)]);

    while let Some(path) = queue.pop_front() {
        if path.hops() >= limits.max_hops {
            continue;
        }

        let mut steps = graph.steps_from(path.target());
        steps.retain(|(_, step)| relations.map_or(true, |allowed| allowed.contains(&step.relation)));
        steps.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.relation.cmp(&b.1.relation)));

        for (next, step) in steps {
            let Some(extended) = path.extend(&next, step) else {
                continue;
            };
            if targets.map_or(true, |t| t.contains(&next)) {
                found.push(extended.clone());
                if found.len() >= limits.max_paths {
                    return found;
                }
            }
            if budget == 0 {
                return found;
            }
            budget -= 1;
            queue.push_back(extended);
        }
    }

    found
}

/// Total order on paths: fewer hops, then heavier, then higher target
/// priority, then node sequence.
pub fn compare_paths(
    a: &TraversalPath,
    b: &TraversalPath,
    priority: &impl Fn(&str) -> u32,
) -> Ordering {
    a.hops()
        .cmp(&b.hops())
        .then_with(|| b.total_weight().total_cmp(&a.total_weight()))
        .then_with(|| priority(b.target()).cmp(&priority(a.target())))
        .then_with(|| a.nodes.cmp(&b.nodes))
        .then_with(|| {
            let ra = a.steps.iter().map(|s| &s.relation);
            let rb = b.steps.iter().map(|s| &s.relation);
            ra.cmp(rb)
        })
}

/// Adjacency rebuilt from whatever edges a backend returned.
#[derive(Debug, Default, Clone)]
pub struct LocalGraph {
    adjacency: BTreeMap<NodeId, Vec<(NodeId, PathStep)>>,
}

impl LocalGraph {
    pub fn from_edges(edges: impl IntoIterator<Item = Edge>) -> Self {
        let mut graph = Self::default();
        for edge in merge_edges(edges) {
            let step = PathStep {
                relation: edge.relation.clone(),
                weight: edge.weight,
            };
            if edge.relation.is_undirected() && edge.source != edge.target {
                graph
                    .adjacency
                    .entry(edge.target.clone())
                    .or_default()
                    .push((edge.source.clone(), step.clone()));
            }
            graph
                .adjacency
                .entry(edge.source)
                .or_default()
                .push((edge.target, step));
        }
        graph
    }

    pub fn is_empty(&self) -> bool {
        self.adjacency.is_empty()
    }
}

impl Neighborhood for LocalGraph {
    fn steps_from(&self, node: &str) -> Vec<(NodeId, PathStep)> {
        self.adjacency.get(node).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(a: &str, b: &str, rel: RelationType, w: f32) -> Edge {
        Edge::new(a, b, rel, w).unwrap()
    }

    fn limits(max_hops: usize) -> PathLimits {
        PathLimits {
            max_hops,
            max_paths: 256,
        }
    }

    #[test]
    fn cycles_never_repeat_nodes() {
        let graph = LocalGraph::from_edges(vec![
            edge("a", "b", RelationType::SimilarTo, 0.9),
            edge("b", "c", RelationType::SimilarTo, 0.8),
            edge("c", "a", RelationType::SimilarTo, 0.7),
            edge("c", "d", RelationType::Calls, 0.5),
        ]);
        let paths = enumerate_paths(&graph, "a", None, None, limits(6));
        assert!(!paths.is_empty());
        for path in &paths {
            let unique: HashSet<_> = path.nodes.iter().collect();
            assert_eq!(unique.len(), path.nodes.len(), "{}", path.render());
            assert_eq!(path.steps.len() + 1, path.nodes.len());
        }
    }

    #[test]
    fn direction_and_relation_filter_apply() {
        let graph = LocalGraph::from_edges(vec![
            edge("a", "b", RelationType::Calls, 0.9),
            edge("c", "a", RelationType::Calls, 0.9),
            edge("a", "d", RelationType::Imports, 0.9),
        ]);
        let calls = [RelationType::Calls];
        let paths = enumerate_paths(&graph, "a", None, Some(&calls), limits(3));
        let targets: Vec<_> = paths.iter().map(|p| p.target().to_string()).collect();
        assert_eq!(targets, vec!["b"]);
    }

    #[test]
    fn hop_and_path_limits_hold() {
        let graph = LocalGraph::from_edges(vec![
            edge("a", "b", RelationType::Calls, 0.9),
            edge("b", "c", RelationType::Calls, 0.9),
            edge("c", "d", RelationType::Calls, 0.9),
        ]);
        let paths = enumerate_paths(&graph, "a", None, None, limits(2));
        assert_eq!(paths.len(), 2);
        assert!(paths.iter().all(|p| p.hops() <= 2));

        let capped = enumerate_paths(
            &graph,
            "a",
            None,
            None,
            PathLimits {
                max_hops: 3,
                max_paths: 1,
            },
        );
        assert_eq!(capped.len(), 1);
    }

    #[test]
    fn targets_restrict_endpoints_but_not_the_walk() {
        let graph = LocalGraph::from_edges(vec![
            edge("a", "b", RelationType::SimilarTo, 0.9),
            edge("b", "c", RelationType::SimilarTo, 0.9),
        ]);
        let targets: HashSet<NodeId> = ["c".to_string()].into_iter().collect();
        let paths = enumerate_paths(&graph, "a", Some(&targets), None, limits(3));
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].nodes, vec!["a", "b", "c"]);
    }

    #[test]
    fn ordering_prefers_short_heavy_high_priority() {
        let graph = LocalGraph::from_edges(vec![
            edge("seed", "low", RelationType::SimilarTo, 0.8),
            edge("seed", "high", RelationType::SimilarTo, 0.8),
            edge("seed", "heavy", RelationType::SimilarTo, 0.95),
            edge("heavy", "far", RelationType::SimilarTo, 1.0),
        ]);
        let priority = |id: &str| if id == "high" { 5 } else { 1 };
        let mut paths = enumerate_paths(&graph, "seed", None, None, limits(2));
        paths.sort_by(|a, b| compare_paths(a, b, &priority));
        let targets: Vec<_> = paths.iter().map(|p| p.target()).collect();
        assert_eq!(targets, vec!["heavy", "high", "low", "far"]);
    }
}
