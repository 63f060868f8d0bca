use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use rootseek_config::RankingConfig;
use rootseek_core::{
    LayerClassifier, NodeId, RankedCandidate, RankingWeights, RetrievalHit, Strategy,
};

use crate::session::{Confidence, EscalationReason};

/// Fused candidates plus the verdict on them.
#[derive(Debug, Clone, PartialEq)]
pub struct Ranking {
    pub candidates: Vec<RankedCandidate>,
    pub confidence: Confidence,
}

/// Merges the hits of every strategy into one ordering.
///
/// A node's composite score is its best weighted hit plus a layer bonus.
/// The result only depends on the set of hits, never on their arrival order.
pub struct HybridRanker {
    weights: RankingWeights,
    classifier: Arc<LayerClassifier>,
    acceptance_threshold: f32,
    disagreement_margin: f32,
}

impl HybridRanker {
    pub fn new(config: &RankingConfig, classifier: Arc<LayerClassifier>) -> Self {
        Self {
            weights: RankingWeights::from(config),
            classifier,
            acceptance_threshold: config.acceptance_threshold,
            disagreement_margin: config.disagreement_margin,
        }
    }

    pub fn weights(&self) -> &RankingWeights {
        &self.weights
    }

    pub fn rank(&self, hits: &[RetrievalHit]) -> Ranking {
        let mut grouped: BTreeMap<NodeId, Vec<RetrievalHit>> = BTreeMap::new();
        for hit in hits {
            grouped.entry(hit.node_id.clone()).or_default().push(hit.clone());
        }

        let mut candidates: Vec<RankedCandidate> = grouped
            .into_iter()
            .map(|(node_id, mut contributing_hits)| {
                contributing_hits.sort_by(|a, b| self.hit_order(a, b));
                let mut candidate = RankedCandidate {
                    layer_priority: self.classifier.classify(&node_id),
                    node_id,
                    composite_score: 0.0,
                    contributing_hits,
                };
                candidate.composite_score = candidate.recompute(&self.weights);
                candidate
            })
            .collect();
        candidates.sort_by(|a, b| {
            b.composite_score
                .total_cmp(&a.composite_score)
                .then_with(|| a.node_id.cmp(&b.node_id))
        });

        let confidence = self.assess(&candidates);
        debug!(
            hits = hits.len(),
            candidates = candidates.len(),
            top = candidates.first().map(|c| c.node_id.as_str()),
            ?confidence,
            "ranked"
        );
        Ranking {
            candidates,
            confidence,
        }
    }

    fn hit_order(&self, a: &RetrievalHit, b: &RetrievalHit) -> Ordering {
        self.weights
            .weighted(b)
            .total_cmp(&self.weights.weighted(a))
            .then_with(|| a.strategy.cmp(&b.strategy))
            .then_with(|| a.line.cmp(&b.line))
    }

    fn assess(&self, candidates: &[RankedCandidate]) -> Confidence {
        let Some(top) = candidates.first() else {
            return Confidence::NeedsEscalation(EscalationReason::NoCandidates);
        };
        if top.composite_score <= self.acceptance_threshold {
            return Confidence::NeedsEscalation(EscalationReason::BelowThreshold {
                top_score: top.composite_score,
                threshold: self.acceptance_threshold,
            });
        }

        for strategy in Strategy::ALL {
            let favourite = candidates
                .iter()
                .filter_map(|c| c.strategy_score(strategy, &self.weights).map(|s| (c, s)))
                .min_by(|(a, sa), (b, sb)| sb.total_cmp(sa).then_with(|| a.node_id.cmp(&b.node_id)));
            let Some((favourite, score)) = favourite else {
                continue;
            };
            if favourite.node_id == top.node_id {
                continue;
            }
            let on_top = top.strategy_score(strategy, &self.weights).unwrap_or(0.0);
            if score - on_top > self.disagreement_margin {
                return Confidence::NeedsEscalation(EscalationReason::Disagreement {
                    strategy,
                    favours: favourite.node_id.clone(),
                });
            }
        }
        Confidence::Confident
    }
}
