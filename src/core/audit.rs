use crate::core::error::NetworkResult;
use crate::models::{AgentMessage, AgentResponse, MessageType, RequestId, ServiceRequest, UserId};
use crate::services::NetworkStore;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

/// Append-only log of agent traffic per request.
///
/// Nothing in ranking reads it back.
#[derive(Clone)]
pub struct AuditTrail {
    store: Arc<dyn NetworkStore>,
}

impl AuditTrail {
    pub fn new(store: Arc<dyn NetworkStore>) -> Self {
        Self { store }
    }

    fn message(
        from: UserId,
        to: Option<UserId>,
        message_type: MessageType,
        payload: serde_json::Value,
        request_id: RequestId,
    ) -> AgentMessage {
        AgentMessage {
            id: Uuid::new_v4(),
            from_user_id: from,
            to_user_id: to,
            message_type,
            payload,
            request_id: Some(request_id),
            created_at: Utc::now(),
        }
    }

    /// One `query_broadcast` per candidate, committed together with the
    /// request's `broadcast_at` stamp. Either all are written or none.
    pub async fn record_broadcast(
        &self,
        requester_id: UserId,
        candidates: &[UserId],
        request_id: RequestId,
    ) -> NetworkResult<ServiceRequest> {
        let messages = candidates
            .iter()
            .map(|&candidate_id| {
                Self::message(
                    requester_id,
                    Some(candidate_id),
                    MessageType::QueryBroadcast,
                    json!({ "requestId": request_id }),
                    request_id,
                )
            })
            .collect();
        self.store.mark_broadcast(request_id, messages).await
    }

    /// `response` from the candidate back to the requester
    pub async fn record_response(
        &self,
        response: &AgentResponse,
        requester_id: UserId,
    ) -> NetworkResult<AgentMessage> {
        let message = Self::message(
            response.responder_id,
            Some(requester_id),
            MessageType::Response,
            json!({
                "requestId": response.request_id,
                "isMatch": response.is_match,
                "matchScore": response.match_score,
            }),
            response.request_id,
        );
        self.store.append_message(message.clone()).await?;
        Ok(message)
    }

    /// Free-form follow-up between two agents about a request
    pub async fn record_clarification(
        &self,
        from: UserId,
        to: Option<UserId>,
        request_id: RequestId,
        text: &str,
    ) -> NetworkResult<AgentMessage> {
        let message = Self::message(
            from,
            to,
            MessageType::Clarification,
            json!({ "requestId": request_id, "text": text }),
            request_id,
        );
        self.store.append_message(message.clone()).await?;
        Ok(message)
    }

    pub async fn for_request(&self, request_id: RequestId) -> NetworkResult<Vec<AgentMessage>> {
        self.store.messages_for_request(request_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::NetworkError;
    use crate::models::{RequestStatus, SearchCriteria, User};
    use crate::services::MemoryStore;

    async fn seeded() -> (Arc<dyn NetworkStore>, UserId, UserId) {
        let store: Arc<dyn NetworkStore> = Arc::new(MemoryStore::new());
        let (a, b) = (Uuid::from_u128(1), Uuid::from_u128(2));
        for id in [a, b] {
            store
                .insert_user(User {
                    id,
                    name: format!("User {}", id),
                    email: format!("{}@example.com", id),
                    created_at: Utc::now(),
                })
                .await
                .unwrap();
        }
        (store, a, b)
    }

    #[tokio::test]
    async fn test_messages_are_scoped_to_request() {
        let (store, a, b) = seeded().await;
        let r1 = store.insert_request(ServiceRequest::new(a, "q1", SearchCriteria::default())).await.unwrap().id;
        let r2 = store.insert_request(ServiceRequest::new(a, "q2", SearchCriteria::default())).await.unwrap().id;
        let audit = AuditTrail::new(store);

        let stamped = audit.record_broadcast(a, &[b], r1).await.unwrap();
        assert!(stamped.broadcast_at.is_some());
        audit.record_clarification(b, Some(a), r1, "remote ok?").await.unwrap();
        audit.record_broadcast(a, &[b], r2).await.unwrap();

        let trail = audit.for_request(r1).await.unwrap();
        assert_eq!(trail.len(), 2);
        assert_eq!(trail[0].message_type, MessageType::QueryBroadcast);
        assert_eq!(trail[0].payload["requestId"], json!(r1));
        assert_eq!(trail[1].message_type, MessageType::Clarification);
    }

    #[tokio::test]
    async fn test_broadcast_log_is_all_or_nothing() {
        let (store, a, b) = seeded().await;
        let open = store.insert_request(ServiceRequest::new(a, "q", SearchCriteria::default())).await.unwrap().id;
        let closed = store.insert_request(ServiceRequest::new(a, "q", SearchCriteria::default())).await.unwrap().id;
        store.transition_request(closed, RequestStatus::Cancelled).await.unwrap();
        let audit = AuditTrail::new(store);

        assert_eq!(
            audit.record_broadcast(a, &[b, b], closed).await,
            Err(NetworkError::RequestNotActive(closed))
        );
        assert!(audit.for_request(closed).await.unwrap().is_empty());

        audit.record_broadcast(a, &[b], open).await.unwrap();
        assert_eq!(
            audit.record_broadcast(a, &[b], open).await,
            Err(NetworkError::AlreadyBroadcast(open))
        );
        assert_eq!(audit.for_request(open).await.unwrap().len(), 1);
    }
}
