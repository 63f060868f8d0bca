//! Hybrid root-cause retrieval engine
//!
//! [`QueryPlanner`] is the entry point: it runs the semantic, graph and
//! lexical strategies in turn, fuses their hits with the [`HybridRanker`]
//! and asks the [`PathExplainer`] for a dependency chain around the winner.

pub mod explainer;
pub mod planner;
pub mod ranker;
pub mod session;
pub mod telemetry;

pub use explainer::{PathExplainer, TargetFilter};
pub use planner::{Backends, QueryPlanner};
pub use ranker::{HybridRanker, Ranking};
pub use session::{
    Answer, AnswerStatus, AttemptStatus, Confidence, EscalationReason, ExplainRecord,
    PlannerState, QuerySession, StrategyAttempt, Trace,
};
