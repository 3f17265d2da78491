use actix_web::{http::StatusCode, web, HttpResponse, Responder};
use validator::Validate;
use crate::core::{Matcher, NetworkError};
use crate::models::{
    AuditTrailResponse, BroadcastResponse, ClarificationRequest, ConnectionsResponse,
    CreateConnectionRequest, CreateServiceRequest, ErrorResponse, HealthResponse, Profile,
    RankedResultsResponse, RecordResponseRequest, RegisterUserRequest, RequestId, RequesterAction,
    SaveProfileRequest, SearchRequest, SearchResponse, UserId,
};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub matcher: Matcher,
}

/// Configure all network routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/health", web::get().to(health_check))
        .route("/users", web::post().to(register_user))
        .route("/users", web::get().to(list_users))
        .route("/profiles", web::put().to(save_profile))
        .route("/profiles/{user_id}", web::get().to(get_profile))
        .route("/connections", web::post().to(create_connection))
        .route("/connections/{user_id}", web::get().to(get_connections))
        .route("/requests", web::post().to(create_request))
        .route("/requests/{id}/broadcast", web::post().to(broadcast_request))
        .route("/requests/{id}/responses", web::post().to(record_response))
        .route("/requests/{id}/results", web::get().to(get_results))
        .route("/requests/{id}/complete", web::post().to(complete_request))
        .route("/requests/{id}/cancel", web::post().to(cancel_request))
        .route("/requests/{id}/messages", web::get().to(get_messages))
        .route("/requests/{id}/messages", web::post().to(add_clarification))
        .route("/search", web::post().to(search));
}

fn status_for(err: &NetworkError) -> StatusCode {
    match err {
        NetworkError::InvalidConnection(_) | NetworkError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        NetworkError::UnknownRequest(_)
        | NetworkError::UnknownCandidate(_)
        | NetworkError::NotFound(_) => StatusCode::NOT_FOUND,
        NetworkError::DuplicateConnection(..)
        | NetworkError::DuplicateResponse { .. }
        | NetworkError::RequestNotActive(_)
        | NetworkError::AlreadyBroadcast(_) => StatusCode::CONFLICT,
        NetworkError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: NetworkError) -> HttpResponse {
    let status = status_for(&err);
    if status.is_server_error() {
        tracing::error!("Request failed: {}", err);
    }
    HttpResponse::build(status).json(ErrorResponse {
        error: err.code().to_string(),
        message: err.to_string(),
        status_code: status.as_u16(),
    })
}

fn validation_failed<T: Validate>(req: &T) -> Option<HttpResponse> {
    req.validate().err().map(|errors| {
        tracing::info!("Validation failed: field_errors={:?}", errors);
        HttpResponse::BadRequest().json(ErrorResponse {
            error: "validation_failed".to_string(),
            message: errors.to_string(),
            status_code: 400,
        })
    })
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let status = if state.matcher.health_check().await { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// POST /api/v1/users
async fn register_user(
    state: web::Data<AppState>,
    req: web::Json<RegisterUserRequest>,
) -> HttpResponse {
    if let Some(resp) = validation_failed(&*req) {
        return resp;
    }
    match state.matcher.register_user(&req.name, &req.email).await {
        Ok(user) => HttpResponse::Created().json(user),
        Err(e) => error_response(e),
    }
}

/// GET /api/v1/users
async fn list_users(state: web::Data<AppState>) -> HttpResponse {
    match state.matcher.list_users().await {
        Ok(users) => HttpResponse::Ok().json(users),
        Err(e) => error_response(e),
    }
}

/// PUT /api/v1/profiles
///
/// Request body:
/// ```json
/// {
///   "userId": "uuid",
///   "title": "Product Designer",
///   "skills": ["Figma", "UX"],
///   "availability": "freelance"
/// }
/// ```
async fn save_profile(
    state: web::Data<AppState>,
    req: web::Json<SaveProfileRequest>,
) -> HttpResponse {
    if let Some(resp) = validation_failed(&*req) {
        return resp;
    }
    let req = req.into_inner();
    let profile = Profile {
        user_id: req.user_id,
        title: req.title,
        bio: req.bio,
        skills: req
            .skills
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        experience_years: req.experience_years,
        availability: req.availability,
        location: req.location,
    };
    match state.matcher.save_profile(profile).await {
        Ok(profile) => HttpResponse::Ok().json(profile),
        Err(e) => error_response(e),
    }
}

/// GET /api/v1/profiles/{user_id}
async fn get_profile(state: web::Data<AppState>, path: web::Path<UserId>) -> HttpResponse {
    match state.matcher.get_user_with_profile(path.into_inner()).await {
        Ok(found) => HttpResponse::Ok().json(found),
        Err(e) => error_response(e),
    }
}

/// POST /api/v1/connections
async fn create_connection(
    state: web::Data<AppState>,
    req: web::Json<CreateConnectionRequest>,
) -> HttpResponse {
    if let Some(resp) = validation_failed(&*req) {
        return resp;
    }
    match state
        .matcher
        .create_connection(req.user_a_id, req.user_b_id, req.trust_score)
        .await
    {
        Ok(connection) => HttpResponse::Created().json(connection),
        Err(e) => error_response(e),
    }
}

/// GET /api/v1/connections/{user_id}
async fn get_connections(state: web::Data<AppState>, path: web::Path<UserId>) -> HttpResponse {
    let user_id = path.into_inner();
    match state.matcher.connections_of(user_id).await {
        Ok(connections) => HttpResponse::Ok().json(ConnectionsResponse { user_id, connections }),
        Err(e) => error_response(e),
    }
}

/// POST /api/v1/requests
async fn create_request(
    state: web::Data<AppState>,
    req: web::Json<CreateServiceRequest>,
) -> HttpResponse {
    if let Some(resp) = validation_failed(&*req) {
        return resp;
    }
    let req = req.into_inner();
    match state
        .matcher
        .create_request(req.requester_id, &req.query_text, req.criteria)
        .await
    {
        Ok(request) => HttpResponse::Created().json(request),
        Err(e) => error_response(e),
    }
}

/// POST /api/v1/requests/{id}/broadcast
///
/// Evaluations continue in the background; poll `/results` for rankings.
async fn broadcast_request(
    state: web::Data<AppState>,
    path: web::Path<RequestId>,
    req: web::Json<RequesterAction>,
) -> HttpResponse {
    let request_id = path.into_inner();
    match state.matcher.broadcast(req.requester_id, request_id).await {
        Ok(pending) => HttpResponse::Accepted().json(BroadcastResponse {
            request_id,
            candidate_count: pending.detach(),
        }),
        Err(e) => error_response(e),
    }
}

/// POST /api/v1/requests/{id}/responses
async fn record_response(
    state: web::Data<AppState>,
    path: web::Path<RequestId>,
    req: web::Json<RecordResponseRequest>,
) -> HttpResponse {
    if let Some(resp) = validation_failed(&*req) {
        return resp;
    }
    match state
        .matcher
        .respond(path.into_inner(), req.candidate_id, req.similarity)
        .await
    {
        Ok(response) => HttpResponse::Created().json(response),
        Err(e) => error_response(e),
    }
}

/// GET /api/v1/requests/{id}/results
async fn get_results(state: web::Data<AppState>, path: web::Path<RequestId>) -> HttpResponse {
    let request_id = path.into_inner();
    match state.matcher.get_ranked_results(request_id).await {
        Ok(matches) => HttpResponse::Ok().json(RankedResultsResponse { request_id, matches }),
        Err(e) => error_response(e),
    }
}

/// POST /api/v1/requests/{id}/complete
async fn complete_request(state: web::Data<AppState>, path: web::Path<RequestId>) -> HttpResponse {
    let request_id = path.into_inner();
    match state.matcher.finalize_request(request_id).await {
        Ok(matches) => HttpResponse::Ok().json(RankedResultsResponse { request_id, matches }),
        Err(e) => error_response(e),
    }
}

/// POST /api/v1/requests/{id}/cancel
async fn cancel_request(
    state: web::Data<AppState>,
    path: web::Path<RequestId>,
    req: web::Json<RequesterAction>,
) -> HttpResponse {
    match state.matcher.cancel_request(req.requester_id, path.into_inner()).await {
        Ok(request) => HttpResponse::Ok().json(request),
        Err(e) => error_response(e),
    }
}

/// GET /api/v1/requests/{id}/messages
async fn get_messages(state: web::Data<AppState>, path: web::Path<RequestId>) -> HttpResponse {
    let request_id = path.into_inner();
    match state.matcher.audit_trail(request_id).await {
        Ok(messages) => HttpResponse::Ok().json(AuditTrailResponse { request_id, messages }),
        Err(e) => error_response(e),
    }
}

/// POST /api/v1/requests/{id}/messages
async fn add_clarification(
    state: web::Data<AppState>,
    path: web::Path<RequestId>,
    req: web::Json<ClarificationRequest>,
) -> HttpResponse {
    if let Some(resp) = validation_failed(&*req) {
        return resp;
    }
    match state
        .matcher
        .add_clarification(path.into_inner(), req.from_user_id, req.to_user_id, &req.text)
        .await
    {
        Ok(message) => HttpResponse::Created().json(message),
        Err(e) => error_response(e),
    }
}

/// POST /api/v1/search
///
/// Request body:
/// ```json
/// {
///   "userId": "uuid",
///   "queryText": "Need a designer for a Figma prototype",
///   "criteria": { "requiredSkills": ["Figma", "UX"] }
/// }
/// ```
async fn search(state: web::Data<AppState>, req: web::Json<SearchRequest>) -> HttpResponse {
    if let Some(resp) = validation_failed(&*req) {
        return resp;
    }
    let req = req.into_inner();

    tracing::info!("Search for user {}: {:?}", req.user_id, req.query_text);

    match state
        .matcher
        .search(req.user_id, &req.query_text, req.criteria)
        .await
    {
        Ok(outcome) => {
            tracing::info!(
                "Returning {} matches for request {} (contacted {})",
                outcome.matches.len(),
                outcome.request_id,
                outcome.total_contacted
            );
            HttpResponse::Ok().json(SearchResponse {
                request_id: outcome.request_id,
                matches: outcome.matches,
                total_contacted: outcome.total_contacted,
            })
        }
        Err(e) => error_response(e),
    }
}
