// Core algorithm exports
pub mod audit;
pub mod broadcast;
pub mod error;
pub mod evaluator;
pub mod filters;
pub mod graph;
pub mod matcher;
pub mod registry;
pub mod scoring;

pub use audit::AuditTrail;
pub use broadcast::{BroadcastPlan, RequestBroadcaster};
pub use error::{NetworkError, NetworkResult};
pub use evaluator::{evaluate, skill_overlap_score};
pub use filters::{matched_skills, matches_availability};
pub use graph::{validate_trust, ConnectionGraph, EdgeKey};
pub use matcher::{EvaluationOutcome, EvaluationSummary, Matcher, PendingEvaluations, SearchOutcome};
pub use registry::ResponseRegistry;
pub use scoring::{calculate_final_score, rank_responses, CandidateCard, DEFAULT_TRUST};
