use crate::core::error::{NetworkError, NetworkResult};
use crate::core::graph::{validate_trust, EdgeKey};
use crate::models::{
    AgentMessage, AgentResponse, Availability, Connection, Location, MessageType, Neighbor,
    Profile, RequestId, RequestStatus, SearchCriteria, ServiceRequest, User, UserId,
};
use crate::services::store::NetworkStore;
use async_trait::async_trait;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use std::collections::BTreeSet;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while setting up the PostgreSQL backend
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),
}

impl From<StoreError> for NetworkError {
    fn from(value: StoreError) -> Self {
        NetworkError::Storage(value.to_string())
    }
}

impl From<sqlx::Error> for NetworkError {
    fn from(value: sqlx::Error) -> Self {
        NetworkError::Storage(value.to_string())
    }
}

/// PostgreSQL-backed store
///
/// Uniqueness invariants are enforced by primary keys and resolved with
/// `ON CONFLICT DO NOTHING ... RETURNING`, so a losing writer sees zero rows
/// instead of an error.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect and run migrations
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
        acquire_timeout_secs: u64,
        idle_timeout_secs: u64,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(acquire_timeout_secs))
            .idle_timeout(Duration::from_secs(idle_timeout_secs))
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        tracing::info!("PostgreSQL store ready (max: {} connections)", max_connections);

        Ok(Self { pool })
    }

    async fn user_exists(&self, user_id: UserId) -> NetworkResult<bool> {
        let row = sqlx::query("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1) AS present")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("present")?)
    }

    async fn request_status(&self, request_id: RequestId) -> NetworkResult<Option<RequestStatus>> {
        let row = sqlx::query("SELECT status FROM service_requests WHERE id = $1")
            .bind(request_id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let status: String = row.try_get("status")?;
                Ok(Some(parse_status(&status)?))
            }
            None => Ok(None),
        }
    }
}

fn parse_status(value: &str) -> NetworkResult<RequestStatus> {
    RequestStatus::parse(value)
        .ok_or_else(|| NetworkError::Storage(format!("unknown request status '{}'", value)))
}

fn user_from_row(row: &PgRow) -> NetworkResult<User> {
    Ok(User {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        created_at: row.try_get("created_at")?,
    })
}

fn profile_from_row(row: &PgRow) -> NetworkResult<Profile> {
    let skills: Json<BTreeSet<String>> = row.try_get("skills")?;
    let location: Option<Json<Location>> = row.try_get("location")?;
    let experience_years: Option<i32> = row.try_get("experience_years")?;
    let availability: String = row.try_get("availability")?;

    Ok(Profile {
        user_id: row.try_get("user_id")?,
        title: row.try_get("title")?,
        bio: row.try_get("bio")?,
        skills: skills.0,
        experience_years: experience_years.map(|years| years.max(0) as u32),
        availability: Availability::parse(&availability).unwrap_or_default(),
        location: location.map(|l| l.0),
    })
}

fn request_from_row(row: &PgRow) -> NetworkResult<ServiceRequest> {
    let criteria: Json<SearchCriteria> = row.try_get("criteria")?;
    let status: String = row.try_get("status")?;

    Ok(ServiceRequest {
        id: row.try_get("id")?,
        requester_id: row.try_get("requester_id")?,
        query_text: row.try_get("query_text")?,
        criteria: criteria.0,
        status: parse_status(&status)?,
        created_at: row.try_get("created_at")?,
        completed_at: row.try_get("completed_at")?,
        broadcast_at: row.try_get("broadcast_at")?,
    })
}

fn response_from_row(row: &PgRow) -> NetworkResult<AgentResponse> {
    let matched_skills: Json<BTreeSet<String>> = row.try_get("matched_skills")?;

    Ok(AgentResponse {
        request_id: row.try_get("request_id")?,
        responder_id: row.try_get("responder_id")?,
        is_match: row.try_get("is_match")?,
        match_score: row.try_get("match_score")?,
        matched_skills: matched_skills.0,
        explanation: row.try_get("explanation")?,
        created_at: row.try_get("created_at")?,
    })
}

fn message_from_row(row: &PgRow) -> NetworkResult<AgentMessage> {
    let message_type: String = row.try_get("message_type")?;
    let payload: Json<serde_json::Value> = row.try_get("payload")?;

    Ok(AgentMessage {
        id: row.try_get("id")?,
        from_user_id: row.try_get("from_user_id")?,
        to_user_id: row.try_get("to_user_id")?,
        message_type: MessageType::parse(&message_type).ok_or_else(|| {
            NetworkError::Storage(format!("unknown message type '{}'", message_type))
        })?,
        payload: payload.0,
        request_id: row.try_get("request_id")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl NetworkStore for PostgresStore {
    async fn insert_user(&self, user: User) -> NetworkResult<User> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO users (id, email, name, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (email) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(user.created_at)
        .fetch_optional(&self.pool)
        .await?;

        match inserted {
            Some(_) => Ok(user),
            None => Err(NetworkError::InvalidInput(format!(
                "email already registered: {}",
                user.email
            ))),
        }
    }

    async fn get_user(&self, user_id: UserId) -> NetworkResult<Option<User>> {
        let row = sqlx::query("SELECT id, email, name, created_at FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn list_users(&self) -> NetworkResult<Vec<User>> {
        let rows = sqlx::query(
            "SELECT id, email, name, created_at FROM users ORDER BY created_at DESC, id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(user_from_row).collect()
    }

    async fn upsert_profile(&self, profile: Profile) -> NetworkResult<Profile> {
        if !self.user_exists(profile.user_id).await? {
            return Err(NetworkError::NotFound(format!("user {}", profile.user_id)));
        }

        sqlx::query(
            r#"
            INSERT INTO profiles (user_id, title, bio, skills, experience_years, availability, location, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
            ON CONFLICT (user_id)
            DO UPDATE SET
                title = EXCLUDED.title,
                bio = EXCLUDED.bio,
                skills = EXCLUDED.skills,
                experience_years = EXCLUDED.experience_years,
                availability = EXCLUDED.availability,
                location = EXCLUDED.location,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(profile.user_id)
        .bind(&profile.title)
        .bind(&profile.bio)
        .bind(Json(&profile.skills))
        .bind(profile.experience_years.map(|years| years.min(i32::MAX as u32) as i32))
        .bind(profile.availability.as_str())
        .bind(profile.location.as_ref().map(Json))
        .execute(&self.pool)
        .await?;

        tracing::debug!("Saved profile for {}", profile.user_id);
        Ok(profile)
    }

    async fn get_profile(&self, user_id: UserId) -> NetworkResult<Option<Profile>> {
        let row = sqlx::query(
            r#"
            SELECT user_id, title, bio, skills, experience_years, availability, location
            FROM profiles
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(profile_from_row).transpose()
    }

    async fn insert_connection(&self, a: UserId, b: UserId, trust: f64) -> NetworkResult<Connection> {
        let key = EdgeKey::new(a, b)?;
        validate_trust(trust)?;
        for user_id in [a, b] {
            if !self.user_exists(user_id).await? {
                return Err(NetworkError::NotFound(format!("user {}", user_id)));
            }
        }

        let row = sqlx::query(
            r#"
            INSERT INTO connections (user_low, user_high, trust_score)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_low, user_high) DO NOTHING
            RETURNING created_at
            "#,
        )
        .bind(key.low)
        .bind(key.high)
        .bind(trust)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Connection {
                user_low: key.low,
                user_high: key.high,
                trust_score: trust,
                created_at: row.try_get("created_at")?,
            }),
            None => Err(NetworkError::DuplicateConnection(key.low, key.high)),
        }
    }

    async fn neighbors(&self, user_id: UserId) -> NetworkResult<Vec<Neighbor>> {
        let rows = sqlx::query(
            r#"
            SELECT CASE WHEN user_low = $1 THEN user_high ELSE user_low END AS peer_id,
                   trust_score
            FROM connections
            WHERE user_low = $1 OR user_high = $1
            ORDER BY peer_id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> NetworkResult<Neighbor> {
                Ok(Neighbor {
                    user_id: row.try_get("peer_id")?,
                    trust_score: row.try_get("trust_score")?,
                })
            })
            .collect()
    }

    async fn trust_between(&self, a: UserId, b: UserId) -> NetworkResult<Option<f64>> {
        let Ok(key) = EdgeKey::new(a, b) else {
            return Ok(None);
        };
        let row = sqlx::query(
            "SELECT trust_score FROM connections WHERE user_low = $1 AND user_high = $2",
        )
        .bind(key.low)
        .bind(key.high)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(row.try_get("trust_score")?)),
            None => Ok(None),
        }
    }

    async fn insert_request(&self, request: ServiceRequest) -> NetworkResult<ServiceRequest> {
        if !self.user_exists(request.requester_id).await? {
            return Err(NetworkError::NotFound(format!("user {}", request.requester_id)));
        }

        sqlx::query(
            r#"
            INSERT INTO service_requests (id, requester_id, query_text, criteria, status, created_at, completed_at, broadcast_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(request.id)
        .bind(request.requester_id)
        .bind(&request.query_text)
        .bind(Json(&request.criteria))
        .bind(request.status.as_str())
        .bind(request.created_at)
        .bind(request.completed_at)
        .bind(request.broadcast_at)
        .execute(&self.pool)
        .await?;

        Ok(request)
    }

    async fn get_request(&self, request_id: RequestId) -> NetworkResult<Option<ServiceRequest>> {
        let row = sqlx::query(
            r#"
            SELECT id, requester_id, query_text, criteria, status, created_at, completed_at, broadcast_at
            FROM service_requests
            WHERE id = $1
            "#,
        )
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(request_from_row).transpose()
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

        let row = sqlx::query(
            r#"
            UPDATE service_requests
            SET status = $2, completed_at = NOW()
            WHERE id = $1 AND status = 'active'
            RETURNING id, requester_id, query_text, criteria, status, created_at, completed_at, broadcast_at
            "#,
        )
        .bind(request_id)
        .bind(to.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => request_from_row(&row),
            None => match self.request_status(request_id).await? {
                Some(_) => Err(NetworkError::RequestNotActive(request_id)),
                None => Err(NetworkError::UnknownRequest(request_id)),
            },
        }
    }

    async fn mark_broadcast(
        &self,
        request_id: RequestId,
        messages: Vec<AgentMessage>,
    ) -> NetworkResult<ServiceRequest> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            UPDATE service_requests
            SET broadcast_at = NOW()
            WHERE id = $1 AND status = 'active' AND broadcast_at IS NULL
            RETURNING id, requester_id, query_text, criteria, status, created_at, completed_at, broadcast_at
            "#,
        )
        .bind(request_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return match self.get_request(request_id).await? {
                None => Err(NetworkError::UnknownRequest(request_id)),
                Some(r) if r.status.is_terminal() => Err(NetworkError::RequestNotActive(request_id)),
                Some(_) => Err(NetworkError::AlreadyBroadcast(request_id)),
            };
        };
        let request = request_from_row(&row)?;

        for message in &messages {
            sqlx::query(
                r#"
                INSERT INTO agent_messages (id, from_user_id, to_user_id, message_type, payload, request_id, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(message.id)
            .bind(message.from_user_id)
            .bind(message.to_user_id)
            .bind(message.message_type.as_str())
            .bind(Json(&message.payload))
            .bind(message.request_id)
            .bind(message.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(request)
    }

    async fn insert_response(&self, response: AgentResponse) -> NetworkResult<AgentResponse> {
        match self.request_status(response.request_id).await? {
            None => return Err(NetworkError::UnknownRequest(response.request_id)),
            Some(status) if status.is_terminal() => {
                return Err(NetworkError::RequestNotActive(response.request_id))
            }
            Some(_) => {}
        }
        if !self.user_exists(response.responder_id).await? {
            return Err(NetworkError::UnknownCandidate(response.responder_id));
        }

        // Status is re-checked inside the insert so a cancel that lands
        // between the checks above and this statement still wins.
        let inserted = sqlx::query(
            r#"
            INSERT INTO agent_responses
                (request_id, responder_id, is_match, match_score, matched_skills, explanation, created_at)
            SELECT $1, $2, $3, $4, $5, $6, $7
            WHERE EXISTS (
                SELECT 1 FROM service_requests WHERE id = $1 AND status = 'active'
            )
            ON CONFLICT (request_id, responder_id) DO NOTHING
            RETURNING request_id
            "#,
        )
        .bind(response.request_id)
        .bind(response.responder_id)
        .bind(response.is_match)
        .bind(response.match_score)
        .bind(Json(&response.matched_skills))
        .bind(&response.explanation)
        .bind(response.created_at)
        .fetch_optional(&self.pool)
        .await?;

        if inserted.is_some() {
            return Ok(response);
        }

        match self.request_status(response.request_id).await? {
            Some(RequestStatus::Active) => Err(NetworkError::DuplicateResponse {
                request_id: response.request_id,
                candidate_id: response.responder_id,
            }),
            Some(_) => Err(NetworkError::RequestNotActive(response.request_id)),
            None => Err(NetworkError::UnknownRequest(response.request_id)),
        }
    }

    async fn responses_for(&self, request_id: RequestId) -> NetworkResult<Vec<AgentResponse>> {
        let rows = sqlx::query(
            r#"
            SELECT request_id, responder_id, is_match, match_score, matched_skills, explanation, created_at
            FROM agent_responses
            WHERE request_id = $1
            ORDER BY responder_id
            "#,
        )
        .bind(request_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(response_from_row).collect()
    }

    async fn append_message(&self, message: AgentMessage) -> NetworkResult<()> {
        sqlx::query(
            r#"
            INSERT INTO agent_messages (id, from_user_id, to_user_id, message_type, payload, request_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(message.id)
        .bind(message.from_user_id)
        .bind(message.to_user_id)
        .bind(message.message_type.as_str())
        .bind(Json(&message.payload))
        .bind(message.request_id)
        .bind(message.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn messages_for_request(&self, request_id: RequestId) -> NetworkResult<Vec<AgentMessage>> {
        let rows = sqlx::query(
            r#"
            SELECT id, from_user_id, to_user_id, message_type, payload, request_id, created_at
            FROM agent_messages
            WHERE request_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(request_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(message_from_row).collect()
    }

    async fn health_check(&self) -> NetworkResult<bool> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(Into::into)
    }
}
