use serde::Serialize;
use std::fmt;

use rootseek_core::{
    NodeId, Query, RankedCandidate, RetrievalHit, RetrievalOutcome, Strategy, TraversalPath,
};

/// Planner state machine positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlannerState {
    Init,
    Semantic,
    Graph,
    Lexical,
    Explain,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Completed,
    Unavailable,
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum EscalationReason {
    NoCandidates,
    BelowThreshold { top_score: f32, threshold: f32 },
    Disagreement { strategy: Strategy, favours: NodeId },
}

impl fmt::Display for EscalationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EscalationReason::NoCandidates => write!(f, "no candidates"),
            EscalationReason::BelowThreshold {
                top_score,
                threshold,
            } => write!(f, "top score {top_score:.3} not above {threshold:.3}"),
            EscalationReason::Disagreement { strategy, favours } => {
                write!(f, "{strategy} favours {favours}")
            }
        }
    }
}

/// Ranker verdict on the current candidate list.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "verdict")]
pub enum Confidence {
    Confident,
    NeedsEscalation(EscalationReason),
}

impl Confidence {
    pub fn is_confident(&self) -> bool {
        matches!(self, Confidence::Confident)
    }
}

/// One strategy transition as reported to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyAttempt {
    pub strategy: Strategy,
    pub status: AttemptStatus,
    pub reason: Option<String>,
    pub hit_count: usize,
    pub top_hit: Option<NodeId>,
    /// Verdict on the merged candidates after this attempt.
    pub confidence: Option<Confidence>,
}

/// Outcome of the explanation step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExplainRecord {
    pub seed: NodeId,
    pub status: AttemptStatus,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Trace {
    pub states: Vec<PlannerState>,
    pub attempts: Vec<StrategyAttempt>,
    pub explain: Option<ExplainRecord>,
}

impl Trace {
    pub fn attempt(&self, strategy: Strategy) -> Option<&StrategyAttempt> {
        self.attempts.iter().find(|a| a.strategy == strategy)
    }

    /// Strategies that ran, in order.
    pub fn attempted(&self) -> Vec<Strategy> {
        self.attempts
            .iter()
            .filter(|a| a.status != AttemptStatus::Skipped)
            .map(|a| a.strategy)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerStatus {
    Confident,
    BestEffort,
    NoCandidates,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub status: AnswerStatus,
    pub candidates: Vec<RankedCandidate>,
    pub explanation: Option<TraversalPath>,
    pub trace: Trace,
}

impl Answer {
    pub fn top(&self) -> Option<&RankedCandidate> {
        self.candidates.first()
    }
}

/// State owned by one query while it is answered.
pub struct QuerySession {
    pub query: Query,
    hits: Vec<RetrievalHit>,
    trace: Trace,
}

impl QuerySession {
    pub fn new(query: Query) -> Self {
        Self {
            query,
            hits: Vec::new(),
            trace: Trace {
                states: vec![PlannerState::Init],
                ..Default::default()
            },
        }
    }

    pub fn enter(&mut self, state: PlannerState) {
        self.trace.states.push(state);
    }

    pub fn hits(&self) -> &[RetrievalHit] {
        &self.hits
    }

    pub fn skip(&mut self, strategy: Strategy, reason: impl Into<String>) {
        self.trace.attempts.push(StrategyAttempt {
            strategy,
            status: AttemptStatus::Skipped,
            reason: Some(reason.into()),
            hit_count: 0,
            top_hit: None,
            confidence: None,
        });
    }

    /// Absorb a finished strategy call. The verdict is filled in later by
    /// [`set_confidence`](Self::set_confidence).
    pub fn record(&mut self, outcome: RetrievalOutcome) {
        let (status, reason) = match &outcome.condition {
            Some(condition) => (AttemptStatus::Unavailable, Some(condition.to_string())),
            None => (AttemptStatus::Completed, None),
        };
        let top_hit = outcome
            .hits
            .iter()
            .max_by(|a, b| {
                a.normalized_score
                    .total_cmp(&b.normalized_score)
                    .then_with(|| b.node_id.cmp(&a.node_id))
            })
            .map(|h| h.node_id.clone());
        self.trace.attempts.push(StrategyAttempt {
            strategy: outcome.strategy,
            status,
            reason,
            hit_count: outcome.hits.len(),
            top_hit,
            confidence: None,
        });
        self.hits.extend(outcome.hits);
    }

    pub fn set_confidence(&mut self, strategy: Strategy, confidence: &Confidence) {
        if let Some(attempt) = self
            .trace
            .attempts
            .iter_mut()
            .rev()
            .find(|a| a.strategy == strategy)
        {
            attempt.confidence = Some(confidence.clone());
        }
    }

    /// True once any strategy failed to reach its backend.
    pub fn degraded(&self) -> bool {
        self.trace
            .attempts
            .iter()
            .any(|a| a.status == AttemptStatus::Unavailable)
    }

    pub fn strategy_status(&self, strategy: Strategy) -> Option<AttemptStatus> {
        self.trace.attempt(strategy).map(|a| a.status)
    }

    pub fn record_explain(&mut self, record: ExplainRecord) {
        self.trace.explain = Some(record);
    }

    pub fn finish(
        mut self,
        candidates: Vec<RankedCandidate>,
        confidence: &Confidence,
        explanation: Option<TraversalPath>,
    ) -> Answer {
        self.enter(PlannerState::Done);
        let status = if candidates.is_empty() {
            AnswerStatus::NoCandidates
        } else if confidence.is_confident() {
            AnswerStatus::Confident
        } else {
            AnswerStatus::BestEffort
        };
        Answer {
            status,
            candidates,
            explanation,
            trace: self.trace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rootseek_core::RetrievalError;

    #[test]
    fn trace_records_each_transition() {
        let mut session = QuerySession::new(Query::text("comment author missing"));
        session.enter(PlannerState::Semantic);
        session.record(RetrievalOutcome::ok(
            Strategy::Semantic,
            vec![
                RetrievalHit::new("b", Strategy::Semantic, 0.3, 0.7),
                RetrievalHit::new("a", Strategy::Semantic, 0.1, 0.9),
            ],
        ));
        session.set_confidence(Strategy::Semantic, &Confidence::Confident);
        session.enter(PlannerState::Lexical);
        session.skip(Strategy::Lexical, "no pattern hint");
        session.enter(PlannerState::Graph);
        session.record(RetrievalOutcome::unavailable(
            Strategy::Graph,
            RetrievalError::IndexUnavailable {
                reason: "down".into(),
            },
        ));

        let answer = session.finish(Vec::new(), &Confidence::Confident, None);
        assert_eq!(answer.status, AnswerStatus::NoCandidates);
        let trace = &answer.trace;
        assert_eq!(trace.states.first(), Some(&PlannerState::Init));
        assert_eq!(trace.states.last(), Some(&PlannerState::Done));
        let semantic = trace.attempt(Strategy::Semantic).unwrap();
        assert_eq!(semantic.hit_count, 2);
        assert_eq!(semantic.top_hit.as_deref(), Some("a"));
        assert_eq!(semantic.confidence, Some(Confidence::Confident));
        assert_eq!(trace.attempt(Strategy::Lexical).unwrap().status, AttemptStatus::Skipped);
        assert_eq!(trace.attempt(Strategy::Graph).unwrap().status, AttemptStatus::Unavailable);
        assert_eq!(trace.attempted(), vec![Strategy::Semantic, Strategy::Graph]);
    }

    #[test]
    fn answer_serializes_for_callers() {
        let session = QuerySession::new(Query::pattern("author_name"));
        let confidence = Confidence::NeedsEscalation(EscalationReason::NoCandidates);
        let answer = session.finish(Vec::new(), &confidence, None);
        let json = serde_json::to_value(&answer).unwrap();
        assert_eq!(json["status"], "no_candidates");
        assert_eq!(json["trace"]["states"][1], "done");
    }
}
