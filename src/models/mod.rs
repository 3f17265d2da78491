// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    AgentMessage, AgentResponse, Availability, Connection, Location, MatchPolicy, MatchResult,
    MessageType, Neighbor, Profile, RankedMatch, RankingWeights, RequestId, RequestStatus,
    SearchCriteria, ServiceRequest, User, UserId,
};
pub use requests::{
    ClarificationRequest, CreateConnectionRequest, CreateServiceRequest, RecordResponseRequest, RegisterUserRequest,
    RequesterAction, SaveProfileRequest, SearchRequest,
};
pub use responses::{
    AuditTrailResponse, BroadcastResponse, ConnectionsResponse, ErrorResponse, HealthResponse,
    RankedResultsResponse, SearchResponse, UserWithProfile,
};
