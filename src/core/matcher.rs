use crate::core::audit::AuditTrail;
use crate::core::broadcast::RequestBroadcaster;
use crate::core::error::{NetworkError, NetworkResult};
use crate::core::evaluator::evaluate;
use crate::core::graph::{validate_trust, EdgeKey};
use crate::core::registry::ResponseRegistry;
use crate::core::scoring::{rank_responses, CandidateCard};
use crate::models::{
    AgentMessage, AgentResponse, Connection, MatchPolicy, Neighbor, Profile, RankedMatch,
    RankingWeights, RequestId, RequestStatus, SearchCriteria, ServiceRequest, User, UserId,
    UserWithProfile,
};
use crate::services::{CacheKey, CacheManager, NetworkStore, NoSimilarity, SimilaritySource};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use uuid::Uuid;

/// Default bound on concurrently running evaluations
pub const DEFAULT_MAX_PARALLEL_EVALUATIONS: usize = 16;

/// What happened to one scheduled evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum EvaluationOutcome {
    Recorded { candidate_id: UserId, is_match: bool },
    /// Candidate has no profile; nothing was recorded
    Skipped { candidate_id: UserId },
    Rejected { candidate_id: UserId, error: NetworkError },
}

/// Totals of a finished broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvaluationSummary {
    pub recorded: usize,
    pub matched: usize,
    pub skipped: usize,
    pub rejected: usize,
}

impl EvaluationSummary {
    fn add(&mut self, outcome: &EvaluationOutcome) {
        match outcome {
            EvaluationOutcome::Recorded { is_match, .. } => {
                self.recorded += 1;
                if *is_match {
                    self.matched += 1;
                }
            }
            EvaluationOutcome::Skipped { .. } => self.skipped += 1,
            EvaluationOutcome::Rejected { .. } => self.rejected += 1,
        }
    }
}

/// Evaluations scheduled by a broadcast
///
/// Dropping this without calling `wait` or `detach` aborts the tasks.
pub struct PendingEvaluations {
    pub request_id: RequestId,
    pub candidate_count: usize,
    tasks: JoinSet<EvaluationOutcome>,
}

impl PendingEvaluations {
    /// Wait for every evaluation to finish
    pub async fn wait(mut self) -> EvaluationSummary {
        let mut summary = EvaluationSummary::default();
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(outcome) => summary.add(&outcome),
                Err(e) => {
                    tracing::error!("Evaluation task for request {} failed: {}", self.request_id, e);
                    summary.rejected += 1;
                }
            }
        }
        summary
    }

    /// Let the evaluations finish in the background
    pub fn detach(mut self) -> usize {
        self.tasks.detach_all();
        self.candidate_count
    }
}

/// Result of the one-shot search flow
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub request_id: RequestId,
    pub matches: Vec<RankedMatch>,
    pub total_contacted: usize,
}

/// Matching orchestrator - broadcast, parallel evaluation, collection, ranking
///
/// # Pipeline Stages
/// 1. Candidate selection from the requester's direct connections
/// 2. One evaluation per candidate, run concurrently
/// 3. Response collection (one verdict per candidate)
/// 4. Trust-weighted ranking
#[derive(Clone)]
pub struct Matcher {
    store: Arc<dyn NetworkStore>,
    similarity: Arc<dyn SimilaritySource>,
    cache: Option<Arc<CacheManager>>,
    audit: AuditTrail,
    broadcaster: RequestBroadcaster,
    registry: ResponseRegistry,
    policy: MatchPolicy,
    weights: RankingWeights,
    evaluation_slots: Arc<Semaphore>,
    /// Bumped on every profile write; cache fills from older reads are dropped
    profile_generation: Arc<AtomicU64>,
}

impl Matcher {
    pub fn new(store: Arc<dyn NetworkStore>) -> Self {
        let audit = AuditTrail::new(store.clone());
        Self {
            broadcaster: RequestBroadcaster::new(store.clone(), audit.clone()),
            registry: ResponseRegistry::new(store.clone(), audit.clone()),
            audit,
            store,
            similarity: Arc::new(NoSimilarity),
            cache: None,
            policy: MatchPolicy::default(),
            weights: RankingWeights::default(),
            evaluation_slots: Arc::new(Semaphore::new(DEFAULT_MAX_PARALLEL_EVALUATIONS)),
            profile_generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn with_policy(mut self, policy: MatchPolicy) -> NetworkResult<Self> {
        policy.validate()?;
        self.policy = policy;
        Ok(self)
    }

    pub fn with_weights(mut self, weights: RankingWeights) -> NetworkResult<Self> {
        weights.validate()?;
        self.weights = weights;
        Ok(self)
    }

    pub fn with_similarity(mut self, similarity: Arc<dyn SimilaritySource>) -> Self {
        self.similarity = similarity;
        self
    }

    pub fn with_cache(mut self, cache: Arc<CacheManager>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_max_parallel_evaluations(mut self, limit: usize) -> Self {
        self.evaluation_slots = Arc::new(Semaphore::new(limit.max(1)));
        self
    }

    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    pub fn weights(&self) -> RankingWeights {
        self.weights
    }

    pub async fn health_check(&self) -> bool {
        self.store.health_check().await.unwrap_or(false)
    }

    // --- identity and profiles -------------------------------------------

    pub async fn register_user(&self, name: &str, email: &str) -> NetworkResult<User> {
        let user = User {
            id: Uuid::new_v4(),
            name: name.trim().to_string(),
            email: email.trim().to_lowercase(),
            created_at: Utc::now(),
        };
        let user = self.store.insert_user(user).await?;
        tracing::info!("Registered user {}", user.id);
        Ok(user)
    }

    pub async fn list_users(&self) -> NetworkResult<Vec<User>> {
        self.store.list_users().await
    }

    pub async fn save_profile(&self, profile: Profile) -> NetworkResult<Profile> {
        let profile = self.store.upsert_profile(profile).await?;
        self.profile_generation.fetch_add(1, Ordering::SeqCst);
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.delete(&CacheKey::profile(profile.user_id)).await {
                tracing::warn!("Failed to invalidate cached profile {}: {}", profile.user_id, e);
            }
        }
        Ok(profile)
    }

    /// Profile lookup through the cache. `Ok(None)` when the user has no profile.
    ///
    /// A read that overlaps a `save_profile` never leaves its stale copy in
    /// the cache.
    async fn load_profile(&self, user_id: UserId) -> NetworkResult<Option<Profile>> {
        let key = CacheKey::profile(user_id);
        if let Some(cache) = &self.cache {
            if let Ok(profile) = cache.get::<Profile>(&key).await {
                return Ok(Some(profile));
            }
        }

        let generation = self.profile_generation.load(Ordering::SeqCst);
        let profile = self.store.get_profile(user_id).await?;

        if let (Some(cache), Some(profile)) = (&self.cache, &profile) {
            if self.profile_generation.load(Ordering::SeqCst) != generation {
                return Ok(Some(profile.clone()));
            }
            if let Err(e) = cache.set(&key, profile).await {
                tracing::warn!("Failed to cache profile {}: {}", user_id, e);
            }
            // A save may have landed between the check and the fill
            if self.profile_generation.load(Ordering::SeqCst) != generation {
                if let Err(e) = cache.delete(&key).await {
                    tracing::warn!("Failed to drop stale profile {}: {}", user_id, e);
                }
            }
        }
        Ok(profile)
    }

    /// The stored profile, or `NotFound`
    pub async fn get_profile(&self, user_id: UserId) -> NetworkResult<Profile> {
        self.load_profile(user_id)
            .await?
            .ok_or_else(|| NetworkError::NotFound(format!("profile for user {}", user_id)))
    }

    pub async fn get_user_with_profile(&self, user_id: UserId) -> NetworkResult<UserWithProfile> {
        let user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or_else(|| NetworkError::NotFound(format!("user {}", user_id)))?;
        let profile = self.load_profile(user_id).await?;
        Ok(UserWithProfile { user, profile })
    }

    // --- connections -------------------------------------------------------

    pub async fn create_connection(&self, a: UserId, b: UserId, trust: f64) -> NetworkResult<Connection> {
        EdgeKey::new(a, b)?;
        validate_trust(trust)?;
        let connection = self.store.insert_connection(a, b, trust).await?;
        tracing::info!(
            "Connected {} <-> {} (trust: {})",
            connection.user_low,
            connection.user_high,
            connection.trust_score
        );
        Ok(connection)
    }

    pub async fn connections_of(&self, user_id: UserId) -> NetworkResult<Vec<Neighbor>> {
        self.store.neighbors(user_id).await
    }

    // --- requests ----------------------------------------------------------

    pub async fn create_request(
        &self,
        requester_id: UserId,
        query_text: &str,
        criteria: SearchCriteria,
    ) -> NetworkResult<ServiceRequest> {
        let request = ServiceRequest::new(requester_id, query_text, criteria);
        let request = self.store.insert_request(request).await?;
        tracing::info!(
            "Created request {} for {} ({} required skills)",
            request.id,
            requester_id,
            request.criteria.required_skills.len()
        );
        Ok(request)
    }

    pub async fn get_request(&self, request_id: RequestId) -> NetworkResult<ServiceRequest> {
        self.store
            .get_request(request_id)
            .await?
            .ok_or(NetworkError::UnknownRequest(request_id))
    }

    /// Whether a semantic score can change any verdict for `criteria`
    fn uses_similarity(&self, criteria: &SearchCriteria) -> bool {
        self.policy.semantic_weight > 0.0 && !criteria.required_skills.is_empty()
    }

    /// Fetch every candidate's similarity score up front, concurrently.
    ///
    /// Evaluation tasks only read the returned map, so no external call
    /// happens once evaluations are running.
    async fn prefetch_similarity(
        &self,
        request: &ServiceRequest,
        candidates: &[Neighbor],
    ) -> HashMap<UserId, f64> {
        let mut scores = HashMap::new();
        if !self.uses_similarity(&request.criteria) {
            return scores;
        }

        let mut fetches = JoinSet::new();
        for candidate in candidates {
            let source = self.similarity.clone();
            let (request_id, candidate_id) = (request.id, candidate.user_id);
            fetches.spawn(async move { (candidate_id, source.similarity(request_id, candidate_id).await) });
        }
        while let Some(joined) = fetches.join_next().await {
            match joined {
                Ok((candidate_id, Some(score))) => {
                    scores.insert(candidate_id, score);
                }
                Ok((_, None)) => {}
                Err(e) => tracing::warn!("Similarity fetch for request {} failed: {}", request.id, e),
            }
        }
        scores
    }

    /// Broadcast to first-degree connections and schedule one evaluation each
    pub async fn broadcast(
        &self,
        requester_id: UserId,
        request_id: RequestId,
    ) -> NetworkResult<PendingEvaluations> {
        let plan = self.broadcaster.broadcast(requester_id, request_id).await?;
        let candidate_count = plan.candidate_count();
        let scores = self.prefetch_similarity(&plan.request, &plan.candidates).await;
        let request = Arc::new(plan.request);

        let mut tasks = JoinSet::new();
        for candidate in plan.candidates {
            let matcher = self.clone();
            let request = request.clone();
            let similarity = scores.get(&candidate.user_id).copied();
            tasks.spawn(async move {
                matcher
                    .evaluate_candidate(&request, candidate.user_id, similarity)
                    .await
            });
        }

        Ok(PendingEvaluations {
            request_id,
            candidate_count,
            tasks,
        })
    }

    /// One scheduled evaluation: load the profile, evaluate, record
    async fn evaluate_candidate(
        &self,
        request: &ServiceRequest,
        candidate_id: UserId,
        similarity: Option<f64>,
    ) -> EvaluationOutcome {
        let _permit = match self.evaluation_slots.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                return EvaluationOutcome::Rejected {
                    candidate_id,
                    error: NetworkError::Storage("evaluation pool closed".to_string()),
                }
            }
        };

        let profile = match self.load_profile(candidate_id).await {
            Ok(Some(profile)) => profile,
            Ok(None) => {
                tracing::debug!("Candidate {} has no profile, skipping", candidate_id);
                return EvaluationOutcome::Skipped { candidate_id };
            }
            Err(error) => {
                tracing::warn!("Failed to load profile for {}: {}", candidate_id, error);
                return EvaluationOutcome::Rejected { candidate_id, error };
            }
        };

        let result = evaluate(&request.criteria, &profile, similarity, &self.policy);

        match self.registry.record(request.id, candidate_id, result).await {
            Ok(response) => EvaluationOutcome::Recorded {
                candidate_id,
                is_match: response.is_match,
            },
            Err(error) => {
                tracing::warn!(
                    "Response from {} for request {} rejected: {}",
                    candidate_id,
                    request.id,
                    error
                );
                EvaluationOutcome::Rejected { candidate_id, error }
            }
        }
    }

    /// Evaluate `profile` against `criteria` and record the verdict
    pub async fn record_response(
        &self,
        request_id: RequestId,
        candidate_id: UserId,
        criteria: &SearchCriteria,
        profile: &Profile,
        similarity: Option<f64>,
    ) -> NetworkResult<AgentResponse> {
        if profile.user_id != candidate_id {
            return Err(NetworkError::InvalidInput(format!(
                "profile belongs to {}, not candidate {}",
                profile.user_id, candidate_id
            )));
        }
        let result = evaluate(criteria, profile, similarity, &self.policy);
        self.registry.record(request_id, candidate_id, result).await
    }

    /// Record a verdict using the stored request criteria and candidate profile
    pub async fn respond(
        &self,
        request_id: RequestId,
        candidate_id: UserId,
        similarity: Option<f64>,
    ) -> NetworkResult<AgentResponse> {
        let request = self.get_request(request_id).await?;
        if self.store.get_user(candidate_id).await?.is_none() {
            return Err(NetworkError::UnknownCandidate(candidate_id));
        }
        let profile = self.get_profile(candidate_id).await?;
        let similarity = match similarity {
            Some(score) => Some(score),
            None if self.uses_similarity(&request.criteria) => {
                self.similarity.similarity(request_id, candidate_id).await
            }
            None => None,
        };
        self.record_response(request_id, candidate_id, &request.criteria, &profile, similarity)
            .await
    }

    /// Rank the matching responses recorded so far.
    ///
    /// Works on a snapshot taken at call time, so it is safe to call while
    /// evaluations are still being recorded.
    pub async fn get_ranked_results(&self, request_id: RequestId) -> NetworkResult<Vec<RankedMatch>> {
        let request = self.get_request(request_id).await?;
        let responses = self.registry.responses(request_id).await?;

        let mut trust = HashMap::new();
        let mut cards = HashMap::new();
        for response in responses.iter().filter(|r| r.is_match) {
            let candidate_id = response.responder_id;
            if let Some(weight) = self.store.trust_between(request.requester_id, candidate_id).await? {
                trust.insert(candidate_id, weight);
            }

            let name = self
                .store
                .get_user(candidate_id)
                .await?
                .map(|u| u.name)
                .unwrap_or_default();
            let title = self.load_profile(candidate_id).await?.and_then(|p| p.title);
            cards.insert(candidate_id, CandidateCard { name, title });
        }

        let ranked = rank_responses(&responses, &trust, &cards, &self.weights);

        tracing::debug!(
            "Ranked {} matches for request {} (from {} responses)",
            ranked.len(),
            request_id,
            responses.len()
        );

        Ok(ranked)
    }

    /// Move the request to `completed`, then rank.
    ///
    /// The transition closes the request to new responses first, so the
    /// returned ranking is final: later `get_ranked_results` calls agree.
    pub async fn finalize_request(&self, request_id: RequestId) -> NetworkResult<Vec<RankedMatch>> {
        self.store
            .transition_request(request_id, RequestStatus::Completed)
            .await?;

        let ranked = self.get_ranked_results(request_id).await?;

        tracing::info!("Completed request {} with {} matches", request_id, ranked.len());
        Ok(ranked)
    }

    pub async fn cancel_request(
        &self,
        requester_id: UserId,
        request_id: RequestId,
    ) -> NetworkResult<ServiceRequest> {
        let request = self.get_request(request_id).await?;
        if request.requester_id != requester_id {
            return Err(NetworkError::UnknownRequest(request_id));
        }

        let cancelled = self
            .store
            .transition_request(request_id, RequestStatus::Cancelled)
            .await?;
        tracing::info!("Cancelled request {}", request_id);
        Ok(cancelled)
    }

    pub async fn audit_trail(&self, request_id: RequestId) -> NetworkResult<Vec<AgentMessage>> {
        self.get_request(request_id).await?;
        self.audit.for_request(request_id).await
    }

    pub async fn add_clarification(
        &self,
        request_id: RequestId,
        from: UserId,
        to: Option<UserId>,
        text: &str,
    ) -> NetworkResult<AgentMessage> {
        let request = self.get_request(request_id).await?;
        if request.status.is_terminal() {
            return Err(NetworkError::RequestNotActive(request_id));
        }
        for user_id in std::iter::once(from).chain(to) {
            if self.store.get_user(user_id).await?.is_none() {
                return Err(NetworkError::NotFound(format!("user {}", user_id)));
            }
        }
        self.audit.record_clarification(from, to, request_id, text).await
    }

    /// Create, broadcast, wait for every evaluation, then finalize
    pub async fn search(
        &self,
        requester_id: UserId,
        query_text: &str,
        criteria: SearchCriteria,
    ) -> NetworkResult<SearchOutcome> {
        let request = self.create_request(requester_id, query_text, criteria).await?;
        let pending = self.broadcast(requester_id, request.id).await?;
        let total_contacted = pending.candidate_count;

        let summary = pending.wait().await;
        tracing::info!(
            "Request {}: {} recorded, {} matched, {} skipped, {} rejected",
            request.id,
            summary.recorded,
            summary.matched,
            summary.skipped,
            summary.rejected
        );

        let matches = self.finalize_request(request.id).await?;

        Ok(SearchOutcome {
            request_id: request.id,
            matches,
            total_contacted,
        })
    }
}
