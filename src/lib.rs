//! Agent Network - trust-weighted skill matching over a professional graph
//!
//! A requester's agent broadcasts a service request to first-degree
//! connections. Each candidate's agent evaluates the request against its
//! profile, and the collected verdicts are ranked by combining match quality
//! with the requester's trust in each candidate.

pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use core::{evaluate, rank_responses, Matcher, NetworkError, NetworkResult};
pub use models::{
    AgentResponse, MatchResult, Profile, RankedMatch, RankingWeights, SearchCriteria, ServiceRequest,
};
