use crate::core::error::{NetworkError, NetworkResult};
use crate::core::graph::ConnectionGraph;
use crate::models::{
    AgentMessage, AgentResponse, Connection, Neighbor, Profile, RequestId, RequestStatus,
    ServiceRequest, User, UserId,
};
use crate::services::store::NetworkStore;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<UserId, User>,
    emails: HashMap<String, UserId>,
    profiles: HashMap<UserId, Profile>,
    graph: ConnectionGraph,
    requests: HashMap<RequestId, ServiceRequest>,
    responses: HashMap<RequestId, BTreeMap<UserId, AgentResponse>>,
    messages: Vec<AgentMessage>,
}

/// In-process store.
///
/// All tables sit behind one lock, so every check-and-write runs under a
/// single write guard and every read sees a consistent snapshot.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NetworkStore for MemoryStore {
    async fn insert_user(&self, user: User) -> NetworkResult<User> {
        let mut tables = self.tables.write().await;
        if tables.emails.contains_key(&user.email) {
            return Err(NetworkError::InvalidInput(format!(
                "email already registered: {}",
                user.email
            )));
        }
        tables.emails.insert(user.email.clone(), user.id);
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, user_id: UserId) -> NetworkResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&user_id).cloned())
    }

    async fn list_users(&self) -> NetworkResult<Vec<User>> {
        let tables = self.tables.read().await;
        let mut users: Vec<User> = tables.users.values().cloned().collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(users)
    }

    async fn upsert_profile(&self, profile: Profile) -> NetworkResult<Profile> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&profile.user_id) {
            return Err(NetworkError::NotFound(format!("user {}", profile.user_id)));
        }
        tables.profiles.insert(profile.user_id, profile.clone());
        Ok(profile)
    }

    async fn get_profile(&self, user_id: UserId) -> NetworkResult<Option<Profile>> {
        Ok(self.tables.read().await.profiles.get(&user_id).cloned())
    }

    async fn insert_connection(&self, a: UserId, b: UserId, trust: f64) -> NetworkResult<Connection> {
        let mut tables = self.tables.write().await;
        for user_id in [a, b] {
            if !tables.users.contains_key(&user_id) {
                return Err(NetworkError::NotFound(format!("user {}", user_id)));
            }
        }
        tables.graph.connect(a, b, trust)
    }

    async fn neighbors(&self, user_id: UserId) -> NetworkResult<Vec<Neighbor>> {
        Ok(self.tables.read().await.graph.neighbors(user_id))
    }

    async fn trust_between(&self, a: UserId, b: UserId) -> NetworkResult<Option<f64>> {
        Ok(self.tables.read().await.graph.trust(a, b))
    }

    async fn insert_request(&self, request: ServiceRequest) -> NetworkResult<ServiceRequest> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&request.requester_id) {
            return Err(NetworkError::NotFound(format!("user {}", request.requester_id)));
        }
        tables.requests.insert(request.id, request.clone());
        Ok(request)
    }

    async fn get_request(&self, request_id: RequestId) -> NetworkResult<Option<ServiceRequest>> {
        Ok(self.tables.read().await.requests.get(&request_id).cloned())
    }

    async fn transition_request(
        &self,
        request_id: RequestId,
        to: RequestStatus,
    ) -> NetworkResult<ServiceRequest> {
        if !to.is_terminal() {
            return Err(NetworkError::InvalidInput(
                "requests can only move to a terminal status".to_string(),
            ));
        }
        let mut tables = self.tables.write().await;
        let request = tables
            .requests
            .get_mut(&request_id)
            .ok_or(NetworkError::UnknownRequest(request_id))?;
        if request.status.is_terminal() {
            return Err(NetworkError::RequestNotActive(request_id));
        }
        request.status = to;
        request.completed_at = Some(Utc::now());
        Ok(request.clone())
    }

    async fn mark_broadcast(
        &self,
        request_id: RequestId,
        messages: Vec<AgentMessage>,
    ) -> NetworkResult<ServiceRequest> {
        let mut tables = self.tables.write().await;
        let request = tables
            .requests
            .get_mut(&request_id)
            .ok_or(NetworkError::UnknownRequest(request_id))?;
        if request.status.is_terminal() {
            return Err(NetworkError::RequestNotActive(request_id));
        }
        if request.broadcast_at.is_some() {
            return Err(NetworkError::AlreadyBroadcast(request_id));
        }
        request.broadcast_at = Some(Utc::now());
        let request = request.clone();
        tables.messages.extend(messages);
        Ok(request)
    }

    async fn insert_response(&self, response: AgentResponse) -> NetworkResult<AgentResponse> {
        let mut tables = self.tables.write().await;

        let request = tables
            .requests
            .get(&response.request_id)
            .ok_or(NetworkError::UnknownRequest(response.request_id))?;
        if request.status.is_terminal() {
            return Err(NetworkError::RequestNotActive(response.request_id));
        }
        if !tables.users.contains_key(&response.responder_id) {
            return Err(NetworkError::UnknownCandidate(response.responder_id));
        }

        let per_request = tables.responses.entry(response.request_id).or_default();
        if per_request.contains_key(&response.responder_id) {
            return Err(NetworkError::DuplicateResponse {
                request_id: response.request_id,
                candidate_id: response.responder_id,
            });
        }
        per_request.insert(response.responder_id, response.clone());
        Ok(response)
    }

    async fn responses_for(&self, request_id: RequestId) -> NetworkResult<Vec<AgentResponse>> {
        Ok(self
            .tables
            .read()
            .await
            .responses
            .get(&request_id)
            .map(|by_responder| by_responder.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn append_message(&self, message: AgentMessage) -> NetworkResult<()> {
        self.tables.write().await.messages.push(message);
        Ok(())
    }

    async fn messages_for_request(&self, request_id: RequestId) -> NetworkResult<Vec<AgentMessage>> {
        Ok(self
            .tables
            .read()
            .await
            .messages
            .iter()
            .filter(|m| m.request_id == Some(request_id))
            .cloned()
            .collect())
    }

    async fn health_check(&self) -> NetworkResult<bool> {
        Ok(true)
    }
}
