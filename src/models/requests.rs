use serde::{Deserialize, Serialize};
use validator::Validate;
use crate::models::domain::{Availability, Location, SearchCriteria, UserId};
use std::collections::BTreeSet;

/// Request to register a user
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RegisterUserRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(email)]
    pub email: String,
}

/// Request to create or replace a profile
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SaveProfileRequest {
    #[serde(alias = "user_id", rename = "userId")]
    pub user_id: UserId,
    #[validate(length(max = 200))]
    pub title: Option<String>,
    #[validate(length(max = 4000))]
    pub bio: Option<String>,
    #[serde(default)]
    pub skills: BTreeSet<String>,
    #[validate(range(max = 80))]
    #[serde(alias = "experience_years", rename = "experienceYears")]
    pub experience_years: Option<u32>,
    #[serde(default)]
    pub availability: Availability,
    pub location: Option<Location>,
}

/// Request to connect two users
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateConnectionRequest {
    #[serde(alias = "user_a_id", rename = "userAId")]
    pub user_a_id: UserId,
    #[serde(alias = "user_b_id", rename = "userBId")]
    pub user_b_id: UserId,
    #[validate(range(min = 0.0, max = 1.0))]
    #[serde(alias = "trust_score", rename = "trustScore", default = "default_trust")]
    pub trust_score: f64,
}

fn default_trust() -> f64 {
    1.0
}

/// Request to open a service request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateServiceRequest {
    #[serde(alias = "requester_id", rename = "requesterId")]
    pub requester_id: UserId,
    #[validate(length(min = 1, max = 2000))]
    #[serde(alias = "query_text", rename = "queryText")]
    pub query_text: String,
    #[serde(default)]
    pub criteria: SearchCriteria,
}

/// Request to broadcast or cancel on behalf of the requester
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RequesterAction {
    #[serde(alias = "requester_id", rename = "requesterId")]
    pub requester_id: UserId,
}

/// Request to record an agent's verdict
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RecordResponseRequest {
    #[serde(alias = "candidate_id", rename = "candidateId")]
    pub candidate_id: UserId,
    #[validate(range(min = 0.0, max = 1.0))]
    pub similarity: Option<f64>,
}

/// One-shot search: create, broadcast, evaluate and rank
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SearchRequest {
    #[serde(alias = "user_id", rename = "userId")]
    pub user_id: UserId,
    #[validate(length(min = 1, max = 2000))]
    #[serde(alias = "query_text", rename = "queryText")]
    pub query_text: String,
    #[serde(default)]
    pub criteria: SearchCriteria,
}

/// Follow-up message between two agents about an open request
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ClarificationRequest {
    #[serde(alias = "from_user_id", rename = "fromUserId")]
    pub from_user_id: UserId,
    #[serde(alias = "to_user_id", rename = "toUserId")]
    pub to_user_id: Option<UserId>,
    #[validate(length(min = 1, max = 2000))]
    pub text: String,
}
