use serde::{Deserialize, Serialize};
use crate::models::domain::{AgentMessage, Neighbor, Profile, RankedMatch, RequestId, User, UserId};

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

/// User together with their profile, if one was saved
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserWithProfile {
    pub user: User,
    pub profile: Option<Profile>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionsResponse {
    #[serde(rename = "userId")]
    pub user_id: UserId,
    pub connections: Vec<Neighbor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastResponse {
    #[serde(rename = "requestId")]
    pub request_id: RequestId,
    #[serde(rename = "candidateCount")]
    pub candidate_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedResultsResponse {
    #[serde(rename = "requestId")]
    pub request_id: RequestId,
    pub matches: Vec<RankedMatch>,
}

/// Response for the one-shot search endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(rename = "requestId")]
    pub request_id: RequestId,
    pub matches: Vec<RankedMatch>,
    #[serde(rename = "totalContacted")]
    pub total_contacted: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditTrailResponse {
    #[serde(rename = "requestId")]
    pub request_id: RequestId,
    pub messages: Vec<AgentMessage>,
}
