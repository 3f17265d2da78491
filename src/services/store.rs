use crate::core::error::NetworkResult;
use crate::models::{
    AgentMessage, AgentResponse, Connection, Neighbor, Profile, RequestId, RequestStatus,
    ServiceRequest, User, UserId,
};
use async_trait::async_trait;

/// Storage operations the matching engine is written against.
///
/// Implementations hold no matching logic. The only non-trivial contracts are
/// the atomic ones:
/// - `insert_connection` rejects a second edge for the same unordered pair
/// - `transition_request` moves a request out of `active` at most once
/// - `mark_broadcast` stamps an active request at most once, together with
///   its broadcast messages
/// - `insert_response` is a check-and-insert per (request, responder): of any
///   number of concurrent calls for one pair exactly one succeeds
///
/// A call that returns an error must leave the store unchanged.
#[async_trait]
pub trait NetworkStore: Send + Sync {
    /// Fails with `InvalidInput` if the email is already registered
    async fn insert_user(&self, user: User) -> NetworkResult<User>;

    async fn get_user(&self, user_id: UserId) -> NetworkResult<Option<User>>;

    async fn list_users(&self) -> NetworkResult<Vec<User>>;

    /// Create or replace the profile; fails with `NotFound` for unknown users
    async fn upsert_profile(&self, profile: Profile) -> NetworkResult<Profile>;

    async fn get_profile(&self, user_id: UserId) -> NetworkResult<Option<Profile>>;

    async fn insert_connection(&self, a: UserId, b: UserId, trust: f64) -> NetworkResult<Connection>;

    async fn neighbors(&self, user_id: UserId) -> NetworkResult<Vec<Neighbor>>;

    async fn trust_between(&self, a: UserId, b: UserId) -> NetworkResult<Option<f64>>;

    async fn insert_request(&self, request: ServiceRequest) -> NetworkResult<ServiceRequest>;

    async fn get_request(&self, request_id: RequestId) -> NetworkResult<Option<ServiceRequest>>;

    /// Compare-and-set from `active` to a terminal status
    async fn transition_request(
        &self,
        request_id: RequestId,
        to: RequestStatus,
    ) -> NetworkResult<ServiceRequest>;

    /// Stamp `broadcast_at` on an active, never-broadcast request and append
    /// its fan-out messages in the same write. Nothing is written on failure.
    async fn mark_broadcast(
        &self,
        request_id: RequestId,
        messages: Vec<AgentMessage>,
    ) -> NetworkResult<ServiceRequest>;

    async fn insert_response(&self, response: AgentResponse) -> NetworkResult<AgentResponse>;

    /// Consistent snapshot of all responses recorded for a request
    async fn responses_for(&self, request_id: RequestId) -> NetworkResult<Vec<AgentResponse>>;

    async fn append_message(&self, message: AgentMessage) -> NetworkResult<()>;

    /// Audit messages linked to a request, oldest first
    async fn messages_for_request(&self, request_id: RequestId) -> NetworkResult<Vec<AgentMessage>>;

    async fn health_check(&self) -> NetworkResult<bool>;
}
