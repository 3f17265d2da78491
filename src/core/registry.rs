use crate::core::audit::AuditTrail;
use crate::core::error::{NetworkError, NetworkResult};
use crate::models::{AgentResponse, MatchResult, RequestId, UserId};
use crate::services::NetworkStore;
use std::sync::Arc;

/// Collects one committed verdict per (request, candidate)
#[derive(Clone)]
pub struct ResponseRegistry {
    store: Arc<dyn NetworkStore>,
    audit: AuditTrail,
}

impl ResponseRegistry {
    pub fn new(store: Arc<dyn NetworkStore>, audit: AuditTrail) -> Self {
        Self { store, audit }
    }

    /// Record a verdict.
    ///
    /// The insert is the store's atomic check-and-insert, so concurrent calls
    /// for the same pair yield one success and `DuplicateResponse` for the rest.
    /// On success a `response` message is appended to the audit trail.
    /// The requester is never a candidate of their own request.
    pub async fn record(
        &self,
        request_id: RequestId,
        candidate_id: UserId,
        result: MatchResult,
    ) -> NetworkResult<AgentResponse> {
        let request = self
            .store
            .get_request(request_id)
            .await?
            .ok_or(NetworkError::UnknownRequest(request_id))?;
        if candidate_id == request.requester_id {
            return Err(NetworkError::UnknownCandidate(candidate_id));
        }

        let response = AgentResponse::from_result(request_id, candidate_id, result);
        let response = self.store.insert_response(response).await?;

        // Verdict is committed; audit failures are logged only
        if let Err(e) = self.audit.record_response(&response, request.requester_id).await {
            tracing::error!(
                "Recorded response {} -> {} but failed to append audit message: {}",
                candidate_id,
                request_id,
                e
            );
        }

        tracing::debug!(
            "Recorded response for request {} from {} (match: {}, score: {:.2})",
            request_id,
            candidate_id,
            response.is_match,
            response.match_score
        );

        Ok(response)
    }

    /// Snapshot of every response recorded so far
    pub async fn responses(&self, request_id: RequestId) -> NetworkResult<Vec<AgentResponse>> {
        self.store.responses_for(request_id).await
    }
}
