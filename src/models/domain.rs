use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Opaque, stable identifier supplied by the identity subsystem
pub type UserId = Uuid;

/// Identifier of a service request
pub type RequestId = Uuid;

/// Registered user. The core only reads the id and display name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// Work availability advertised on a profile
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Availability {
    FullTime,
    PartTime,
    Freelance,
    #[default]
    Unspecified,
}

impl Availability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Availability::FullTime => "full-time",
            Availability::PartTime => "part-time",
            Availability::Freelance => "freelance",
            Availability::Unspecified => "unspecified",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "full-time" => Some(Availability::FullTime),
            "part-time" => Some(Availability::PartTime),
            "freelance" => Some(Availability::Freelance),
            "unspecified" => Some(Availability::Unspecified),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub city: String,
    pub country: String,
}

/// Professional profile, owned 1:1 by a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(rename = "userId")]
    pub user_id: UserId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub skills: BTreeSet<String>,
    #[serde(rename = "experienceYears", default)]
    pub experience_years: Option<u32>,
    #[serde(default)]
    pub availability: Availability,
    #[serde(default)]
    pub location: Option<Location>,
}

impl Profile {
    /// Profile with only skills filled in
    pub fn with_skills<I, S>(user_id: UserId, skills: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            user_id,
            title: None,
            bio: None,
            skills: skills.into_iter().map(Into::into).collect(),
            experience_years: None,
            availability: Availability::Unspecified,
            location: None,
        }
    }
}

/// Undirected, trust-weighted edge between two distinct users.
///
/// `user_low`/`user_high` hold the endpoints in canonical (sorted) order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    #[serde(rename = "userLow")]
    pub user_low: UserId,
    #[serde(rename = "userHigh")]
    pub user_high: UserId,
    #[serde(rename = "trustScore")]
    pub trust_score: f64,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// A first-degree peer and the trust weight of the edge leading to it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    #[serde(rename = "userId")]
    pub user_id: UserId,
    #[serde(rename = "trustScore")]
    pub trust_score: f64,
}

/// Structured criteria of a service request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchCriteria {
    #[serde(rename = "requiredSkills", default)]
    pub required_skills: BTreeSet<String>,
    #[serde(default)]
    pub availability: Option<Availability>,
}

impl SearchCriteria {
    pub fn skills<I, S>(skills: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            required_skills: skills.into_iter().map(Into::into).collect(),
            availability: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Active,
    Completed,
    Cancelled,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Active => "active",
            RequestStatus::Completed => "completed",
            RequestStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(RequestStatus::Active),
            "completed" => Some(RequestStatus::Completed),
            "cancelled" => Some(RequestStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestStatus::Active)
    }
}

/// A broadcastable request for a skill match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRequest {
    pub id: RequestId,
    #[serde(rename = "requesterId")]
    pub requester_id: UserId,
    #[serde(rename = "queryText")]
    pub query_text: String,
    pub criteria: SearchCriteria,
    pub status: RequestStatus,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "completedAt")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Set once, when the request is fanned out to the requester's peers
    #[serde(rename = "broadcastAt")]
    pub broadcast_at: Option<DateTime<Utc>>,
}

impl ServiceRequest {
    pub fn new(requester_id: UserId, query_text: impl Into<String>, criteria: SearchCriteria) -> Self {
        Self {
            id: Uuid::new_v4(),
            requester_id,
            query_text: query_text.into(),
            criteria,
            status: RequestStatus::Active,
            created_at: Utc::now(),
            completed_at: None,
            broadcast_at: None,
        }
    }
}

/// Verdict of a single match evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    #[serde(rename = "isMatch")]
    pub is_match: bool,
    pub score: f64,
    #[serde(rename = "matchedSkills")]
    pub matched_skills: BTreeSet<String>,
    pub explanation: String,
}

/// One agent's committed verdict for one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    #[serde(rename = "requestId")]
    pub request_id: RequestId,
    #[serde(rename = "responderId")]
    pub responder_id: UserId,
    #[serde(rename = "isMatch")]
    pub is_match: bool,
    #[serde(rename = "matchScore")]
    pub match_score: f64,
    #[serde(rename = "matchedSkills")]
    pub matched_skills: BTreeSet<String>,
    pub explanation: String,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl AgentResponse {
    pub fn from_result(request_id: RequestId, responder_id: UserId, result: MatchResult) -> Self {
        Self {
            request_id,
            responder_id,
            is_match: result.is_match,
            match_score: result.score,
            matched_skills: result.matched_skills,
            explanation: result.explanation,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    QueryBroadcast,
    Response,
    Clarification,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::QueryBroadcast => "query_broadcast",
            MessageType::Response => "response",
            MessageType::Clarification => "clarification",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "query_broadcast" => Some(MessageType::QueryBroadcast),
            "response" => Some(MessageType::Response),
            "clarification" => Some(MessageType::Clarification),
            _ => None,
        }
    }
}

/// Append-only audit record of agent traffic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMessage {
    pub id: Uuid,
    #[serde(rename = "fromUserId")]
    pub from_user_id: UserId,
    /// `None` means the message was broadcast
    #[serde(rename = "toUserId")]
    pub to_user_id: Option<UserId>,
    #[serde(rename = "messageType")]
    pub message_type: MessageType,
    pub payload: serde_json::Value,
    #[serde(rename = "requestId")]
    pub request_id: Option<RequestId>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

/// Ranked match result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedMatch {
    #[serde(rename = "candidateId")]
    pub candidate_id: UserId,
    pub name: String,
    pub title: Option<String>,
    #[serde(rename = "matchScore")]
    pub match_score: f64,
    #[serde(rename = "matchedSkills")]
    pub matched_skills: BTreeSet<String>,
    pub explanation: String,
    #[serde(rename = "trustScore")]
    pub trust_score: f64,
    #[serde(rename = "finalScore")]
    pub final_score: f64,
}

/// Weights blending match quality with relationship trust
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankingWeights {
    pub match_score: f64,
    pub trust: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            match_score: 0.7,
            trust: 0.3,
        }
    }
}

/// Evaluation policy: the match threshold and how much semantic similarity counts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchPolicy {
    pub match_threshold: f64,
    pub semantic_weight: f64,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            match_threshold: 0.3,
            semantic_weight: 0.0,
        }
    }
}
