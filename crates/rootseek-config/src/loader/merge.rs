//! Configuration merging logic
//!
//! Fields in `overlay` that differ from their defaults replace the
//! corresponding fields in `base`.

use crate::{types::*, Config};

/// Merge two configurations, with `overlay` taking precedence
pub fn merge(mut base: Config, overlay: Config) -> Config {
    base.ranking = merge_ranking(base.ranking, overlay.ranking);
    base.layers = merge_layers(base.layers, overlay.layers);
    base.graph = merge_graph(base.graph, overlay.graph);
    base.retrieval = merge_retrieval(base.retrieval, overlay.retrieval);
    base.planner = merge_planner(base.planner, overlay.planner);
    base
}

fn pick<T: PartialEq>(base: T, overlay: T, default: &T) -> T {
    if overlay != *default {
        overlay
    } else {
        base
    }
}

fn pick_f32(base: f32, overlay: f32, default: f32) -> f32 {
    if (overlay - default).abs() > 0.001 {
        overlay
    } else {
        base
    }
}

fn merge_ranking(base: RankingConfig, overlay: RankingConfig) -> RankingConfig {
    let default = RankingConfig::default();
    RankingConfig {
        semantic: pick_f32(base.semantic, overlay.semantic, default.semantic),
        graph: pick_f32(base.graph, overlay.graph, default.graph),
        lexical: pick_f32(base.lexical, overlay.lexical, default.lexical),
        layer_bonus_divisor: pick_f32(
            base.layer_bonus_divisor,
            overlay.layer_bonus_divisor,
            default.layer_bonus_divisor,
        ),
        acceptance_threshold: pick_f32(
            base.acceptance_threshold,
            overlay.acceptance_threshold,
            default.acceptance_threshold,
        ),
        disagreement_margin: pick_f32(
            base.disagreement_margin,
            overlay.disagreement_margin,
            default.disagreement_margin,
        ),
    }
}

fn merge_layers(base: LayerConfig, overlay: LayerConfig) -> LayerConfig {
    let default = LayerConfig::default();
    LayerConfig {
        rules: pick(base.rules, overlay.rules, &default.rules),
        fallback_priority: pick(
            base.fallback_priority,
            overlay.fallback_priority,
            &default.fallback_priority,
        ),
    }
}

fn merge_graph(base: GraphConfig, overlay: GraphConfig) -> GraphConfig {
    let default = GraphConfig::default();
    GraphConfig {
        max_hops: pick(base.max_hops, overlay.max_hops, &default.max_hops),
        max_paths: pick(base.max_paths, overlay.max_paths, &default.max_paths),
        relations: pick(base.relations, overlay.relations, &default.relations),
        similarity_threshold: pick_f32(
            base.similarity_threshold,
            overlay.similarity_threshold,
            default.similarity_threshold,
        ),
        expansion_seeds: pick(
            base.expansion_seeds,
            overlay.expansion_seeds,
            &default.expansion_seeds,
        ),
    }
}

fn merge_retrieval(base: RetrievalConfig, overlay: RetrievalConfig) -> RetrievalConfig {
    let default = RetrievalConfig::default();
    RetrievalConfig {
        timeout_ms: pick(base.timeout_ms, overlay.timeout_ms, &default.timeout_ms),
        top_k: pick(base.top_k, overlay.top_k, &default.top_k),
        lexical_max_matches: pick(
            base.lexical_max_matches,
            overlay.lexical_max_matches,
            &default.lexical_max_matches,
        ),
        include_paths: pick(
            base.include_paths,
            overlay.include_paths,
            &default.include_paths,
        ),
        exclude_paths: pick(
            base.exclude_paths,
            overlay.exclude_paths,
            &default.exclude_paths,
        ),
    }
}

fn merge_planner(base: PlannerConfig, overlay: PlannerConfig) -> PlannerConfig {
    let default = PlannerConfig::default();
    PlannerConfig {
        mode: pick(base.mode, overlay.mode, &default.mode),
        explain: pick(base.explain, overlay.explain, &default.explain),
        derive_literal_hints: pick(
            base.derive_literal_hints,
            overlay.derive_literal_hints,
            &default.derive_literal_hints,
        ),
        max_candidates: pick(
            base.max_candidates,
            overlay.max_candidates,
            &default.max_candidates,
        ),
    }
}
