use crate::models::{RequestId, UserId};
use thiserror::Error;

/// Failures of the broadcast, evaluation and ranking engine.
///
/// Every variant except `Storage` is a local validation failure: retrying the
/// same call cannot succeed, and a rejected call leaves the store unchanged.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NetworkError {
    #[error("Invalid connection: a user cannot connect to themselves ({0})")]
    InvalidConnection(UserId),

    #[error("Connection already exists between {0} and {1}")]
    DuplicateConnection(UserId, UserId),

    #[error("Unknown request: {0}")]
    UnknownRequest(RequestId),

    #[error("Unknown candidate: {0}")]
    UnknownCandidate(UserId),

    #[error("Response already recorded for request {request_id} by {candidate_id}")]
    DuplicateResponse {
        request_id: RequestId,
        candidate_id: UserId,
    },

    #[error("Request {0} is no longer active")]
    RequestNotActive(RequestId),

    #[error("Request {0} has already been broadcast")]
    AlreadyBroadcast(RequestId),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl NetworkError {
    /// Short machine-readable code for API error bodies
    pub fn code(&self) -> &'static str {
        match self {
            NetworkError::InvalidConnection(_) => "invalid_connection",
            NetworkError::DuplicateConnection(..) => "duplicate_connection",
            NetworkError::UnknownRequest(_) => "unknown_request",
            NetworkError::UnknownCandidate(_) => "unknown_candidate",
            NetworkError::DuplicateResponse { .. } => "duplicate_response",
            NetworkError::RequestNotActive(_) => "request_not_active",
            NetworkError::AlreadyBroadcast(_) => "already_broadcast",
            NetworkError::NotFound(_) => "not_found",
            NetworkError::InvalidInput(_) => "invalid_input",
            NetworkError::Storage(_) => "storage_error",
        }
    }
}

pub type NetworkResult<T> = Result<T, NetworkError>;
