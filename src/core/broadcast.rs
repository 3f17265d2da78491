use crate::core::audit::AuditTrail;
use crate::core::error::{NetworkError, NetworkResult};
use crate::models::{Neighbor, RequestId, ServiceRequest, UserId};
use crate::services::NetworkStore;
use std::sync::Arc;

/// Candidates selected for one broadcast
#[derive(Debug, Clone)]
pub struct BroadcastPlan {
    pub request: ServiceRequest,
    pub candidates: Vec<Neighbor>,
}

impl BroadcastPlan {
    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }
}

/// Fans a request out to the requester's first-degree connections
#[derive(Clone)]
pub struct RequestBroadcaster {
    store: Arc<dyn NetworkStore>,
    audit: AuditTrail,
}

impl RequestBroadcaster {
    pub fn new(store: Arc<dyn NetworkStore>, audit: AuditTrail) -> Self {
        Self { store, audit }
    }

    /// Select candidates and log one `query_broadcast` per candidate.
    ///
    /// The candidate set is exactly the requester's direct neighbors. Trust
    /// does not filter it. An empty set is a valid broadcast to nobody.
    /// A request is broadcast at most once; a repeat fails with
    /// `AlreadyBroadcast` and logs nothing.
    pub async fn broadcast(
        &self,
        requester_id: UserId,
        request_id: RequestId,
    ) -> NetworkResult<BroadcastPlan> {
        let request = self
            .store
            .get_request(request_id)
            .await?
            .filter(|r| r.requester_id == requester_id)
            .ok_or(NetworkError::UnknownRequest(request_id))?;

        if request.status.is_terminal() {
            return Err(NetworkError::RequestNotActive(request_id));
        }
        if request.broadcast_at.is_some() {
            return Err(NetworkError::AlreadyBroadcast(request_id));
        }

        let candidates = self.store.neighbors(requester_id).await?;
        let candidate_ids: Vec<UserId> = candidates.iter().map(|c| c.user_id).collect();

        // The store re-checks status and the stamp under its own lock
        let request = self
            .audit
            .record_broadcast(requester_id, &candidate_ids, request_id)
            .await?;

        tracing::info!(
            "Broadcast request {} from {} to {} candidates",
            request_id,
            requester_id,
            candidates.len()
        );

        Ok(BroadcastPlan {
            request,
            candidates,
        })
    }
}
