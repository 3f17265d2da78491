// Integration tests for the agent network

use agent_network::core::{Matcher, NetworkError, NetworkResult};
use agent_network::models::{
    AgentMessage, AgentResponse, Connection, MatchPolicy, MessageType, Neighbor, Profile,
    RequestId, RequestStatus, SearchCriteria, ServiceRequest, User, UserId,
};
use agent_network::services::{CacheManager, MemoryStore, NetworkStore, SimilaritySource};
use async_trait::async_trait;
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

async fn register(matcher: &Matcher, name: &str) -> User {
    matcher
        .register_user(name, &format!("{}@example.com", name.to_lowercase()))
        .await
        .unwrap()
}

async fn with_skills(matcher: &Matcher, user: &User, title: &str, skills: &[&str]) {
    let mut profile = Profile::with_skills(user.id, skills.iter().copied());
    profile.title = Some(title.to_string());
    matcher.save_profile(profile).await.unwrap();
}

#[tokio::test]
async fn test_end_to_end_trust_weighted_ranking() {
    // Lowered threshold so a 0.2 skill overlap still counts as a match
    let matcher = Matcher::new(Arc::new(MemoryStore::new()))
        .with_policy(MatchPolicy {
            match_threshold: 0.2,
            semantic_weight: 0.0,
        })
        .unwrap();

    let a = register(&matcher, "Ada").await;
    let b = register(&matcher, "Bea").await;
    let c = register(&matcher, "Cal").await;

    with_skills(&matcher, &b, "Designer", &["Figma"]).await;
    with_skills(&matcher, &c, "Illustrator", &["Figma"]).await;
    matcher.create_connection(a.id, b.id, 0.9).await.unwrap();
    matcher.create_connection(c.id, a.id, 0.95).await.unwrap();

    let criteria_b = SearchCriteria::skills(["Figma", "Sketch"]);
    let request = matcher.create_request(a.id, "design help", criteria_b.clone()).await.unwrap();
    let b_profile = matcher.get_profile(b.id).await.unwrap();
    let c_profile = matcher.get_profile(c.id).await.unwrap();
    let criteria_c = SearchCriteria::skills(["Figma", "Sketch", "Blender", "Maya", "Houdini"]);

    matcher
        .record_response(request.id, b.id, &criteria_b, &b_profile, None)
        .await
        .unwrap();
    matcher
        .record_response(request.id, c.id, &criteria_c, &c_profile, None)
        .await
        .unwrap();

    let ranked = matcher.get_ranked_results(request.id).await.unwrap();
    assert_eq!(ranked.len(), 2);
    assert_eq!(ranked[0].candidate_id, b.id);
    assert_eq!(ranked[0].name, "Bea");
    assert_eq!(ranked[0].title.as_deref(), Some("Designer"));
    assert!((ranked[0].final_score - 0.62).abs() < 1e-9);
    assert_eq!(ranked[1].candidate_id, c.id);
    assert!((ranked[1].final_score - 0.425).abs() < 1e-9);
}

#[tokio::test]
async fn test_broadcast_with_no_connections() {
    let matcher = Matcher::new(Arc::new(MemoryStore::new()));
    let a = register(&matcher, "Ada").await;
    let request = matcher
        .create_request(a.id, "anyone?", SearchCriteria::skills(["Rust"]))
        .await
        .unwrap();

    let pending = matcher.broadcast(a.id, request.id).await.unwrap();
    assert_eq!(pending.candidate_count, 0);
    let summary = pending.wait().await;
    assert_eq!(summary.recorded, 0);

    assert!(matcher.get_ranked_results(request.id).await.unwrap().is_empty());
    assert!(matcher.audit_trail(request.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_second_response_rejected_first_kept() {
    let matcher = Matcher::new(Arc::new(MemoryStore::new()));
    let a = register(&matcher, "Ada").await;
    let b = register(&matcher, "Bea").await;
    with_skills(&matcher, &b, "Engineer", &["Rust"]).await;
    matcher.create_connection(a.id, b.id, 0.5).await.unwrap();

    let request = matcher
        .create_request(a.id, "rust", SearchCriteria::skills(["Rust"]))
        .await
        .unwrap();
    let first = matcher.respond(request.id, b.id, None).await.unwrap();

    let other = Profile::with_skills(b.id, ["Go"]);
    let second = matcher
        .record_response(request.id, b.id, &request.criteria, &other, None)
        .await;
    assert_eq!(
        second,
        Err(NetworkError::DuplicateResponse {
            request_id: request.id,
            candidate_id: b.id
        })
    );

    let ranked = matcher.get_ranked_results(request.id).await.unwrap();
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].match_score, first.match_score);
    assert!(ranked[0].matched_skills.contains("Rust"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_duplicate_responses_yield_one_success() {
    let matcher = Matcher::new(Arc::new(MemoryStore::new()));
    let a = register(&matcher, "Ada").await;
    let b = register(&matcher, "Bea").await;
    with_skills(&matcher, &b, "Engineer", &["Rust"]).await;
    matcher.create_connection(a.id, b.id, 0.5).await.unwrap();
    let request = matcher
        .create_request(a.id, "rust", SearchCriteria::skills(["Rust"]))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..32 {
        let matcher = matcher.clone();
        let (request_id, candidate_id) = (request.id, b.id);
        handles.push(tokio::spawn(async move {
            matcher.respond(request_id, candidate_id, None).await
        }));
    }

    let mut successes = 0;
    let mut duplicates = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(NetworkError::DuplicateResponse { .. }) => duplicates += 1,
            Err(other) => panic!("unexpected error: {}", other),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(duplicates, 31);

    let responses = matcher
        .audit_trail(request.id)
        .await
        .unwrap()
        .into_iter()
        .filter(|m| m.message_type == MessageType::Response)
        .count();
    assert_eq!(responses, 1);
}

#[tokio::test]
async fn test_search_ranks_only_matches_and_completes() {
    let matcher = Matcher::new(Arc::new(MemoryStore::new())).with_max_parallel_evaluations(2);
    let a = register(&matcher, "Ada").await;

    let mut expected = Vec::new();
    for i in 0..6 {
        let user = register(&matcher, &format!("Peer{}", i)).await;
        let skills: &[&str] = if i % 2 == 0 { &["Rust", "SQL"] } else { &["COBOL"] };
        with_skills(&matcher, &user, "Dev", skills).await;
        matcher.create_connection(a.id, user.id, 0.5).await.unwrap();
        if i % 2 == 0 {
            expected.push(user.id);
        }
    }
    // Connected but without a profile
    let silent = register(&matcher, "Silent").await;
    matcher.create_connection(a.id, silent.id, 1.0).await.unwrap();

    let outcome = matcher
        .search(a.id, "rust + sql", SearchCriteria::skills(["Rust", "SQL"]))
        .await
        .unwrap();

    assert_eq!(outcome.total_contacted, 7);
    let got: Vec<_> = outcome.matches.iter().map(|m| m.candidate_id).collect();
    // Equal scores: ordered by candidate id
    expected.sort();
    assert_eq!(got, expected);

    let request = matcher.get_request(outcome.request_id).await.unwrap();
    assert_eq!(request.status, RequestStatus::Completed);
    assert!(request.completed_at.is_some());

    let again = matcher.get_ranked_results(outcome.request_id).await.unwrap();
    assert_eq!(again, outcome.matches);
}

#[tokio::test]
async fn test_terminal_requests_reject_mutation() {
    let matcher = Matcher::new(Arc::new(MemoryStore::new()));
    let a = register(&matcher, "Ada").await;
    let b = register(&matcher, "Bea").await;
    with_skills(&matcher, &b, "Engineer", &["Rust"]).await;
    matcher.create_connection(a.id, b.id, 0.5).await.unwrap();
    let request = matcher
        .create_request(a.id, "rust", SearchCriteria::skills(["Rust"]))
        .await
        .unwrap();

    assert_eq!(
        matcher.cancel_request(b.id, request.id).await,
        Err(NetworkError::UnknownRequest(request.id))
    );
    let cancelled = matcher.cancel_request(a.id, request.id).await.unwrap();
    assert_eq!(cancelled.status, RequestStatus::Cancelled);

    assert!(matches!(
        matcher.broadcast(a.id, request.id).await,
        Err(NetworkError::RequestNotActive(_))
    ));
    assert_eq!(
        matcher.respond(request.id, b.id, None).await,
        Err(NetworkError::RequestNotActive(request.id))
    );
    assert_eq!(
        matcher.finalize_request(request.id).await,
        Err(NetworkError::RequestNotActive(request.id))
    );
    assert_eq!(
        matcher.cancel_request(a.id, request.id).await,
        Err(NetworkError::RequestNotActive(request.id))
    );
}

#[tokio::test]
async fn test_unknown_ids() {
    let matcher = Matcher::new(Arc::new(MemoryStore::new()));
    let a = register(&matcher, "Ada").await;
    let missing = Uuid::new_v4();

    assert!(matches!(
        matcher.create_request(missing, "q", SearchCriteria::skills(["Rust"])).await,
        Err(NetworkError::NotFound(_))
    ));
    assert_eq!(
        matcher.get_ranked_results(missing).await,
        Err(NetworkError::UnknownRequest(missing))
    );

    let request = matcher
        .create_request(a.id, "q", SearchCriteria::skills(["Rust"]))
        .await
        .unwrap();
    assert_eq!(
        matcher.respond(request.id, missing, None).await,
        Err(NetworkError::UnknownCandidate(missing))
    );
    assert_eq!(
        matcher.create_connection(a.id, a.id, 0.5).await,
        Err(NetworkError::InvalidConnection(a.id))
    );
    assert!(matches!(
        matcher.create_connection(a.id, missing, 1.5).await,
        Err(NetworkError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_broadcast_audit_trail() {
    let matcher = Matcher::new(Arc::new(MemoryStore::new()));
    let a = register(&matcher, "Ada").await;
    let b = register(&matcher, "Bea").await;
    let c = register(&matcher, "Cal").await;
    with_skills(&matcher, &b, "Engineer", &["Rust"]).await;
    with_skills(&matcher, &c, "Engineer", &["Go"]).await;
    matcher.create_connection(a.id, b.id, 0.5).await.unwrap();
    matcher.create_connection(a.id, c.id, 0.5).await.unwrap();

    let request = matcher
        .create_request(a.id, "rust", SearchCriteria::skills(["Rust"]))
        .await
        .unwrap();
    let summary = matcher.broadcast(a.id, request.id).await.unwrap().wait().await;
    assert_eq!(summary.recorded, 2);
    assert_eq!(summary.matched, 1);

    let trail = matcher.audit_trail(request.id).await.unwrap();
    let broadcasts: Vec<_> = trail
        .iter()
        .filter(|m| m.message_type == MessageType::QueryBroadcast)
        .collect();
    assert_eq!(broadcasts.len(), 2);
    assert!(broadcasts.iter().all(|m| m.from_user_id == a.id));
    assert_eq!(
        trail.iter().filter(|m| m.message_type == MessageType::Response).count(),
        2
    );
}

struct FixedSimilarity(f64);

#[async_trait]
impl SimilaritySource for FixedSimilarity {
    async fn similarity(&self, _request_id: Uuid, _candidate_id: Uuid) -> Option<f64> {
        Some(self.0)
    }
}

#[tokio::test]
async fn test_similarity_source_lifts_partial_match() {
    let store: Arc<dyn NetworkStore> = Arc::new(MemoryStore::new());
    let matcher = Matcher::new(store)
        .with_similarity(Arc::new(FixedSimilarity(1.0)))
        .with_policy(MatchPolicy {
            match_threshold: 0.5,
            semantic_weight: 0.5,
        })
        .unwrap();

    let a = register(&matcher, "Ada").await;
    let b = register(&matcher, "Bea").await;
    with_skills(&matcher, &b, "Engineer", &["Rust"]).await;
    matcher.create_connection(a.id, b.id, 0.5).await.unwrap();

    // 1 of 4 skills alone is 0.25; blended with similarity 1.0 it is 0.625
    let outcome = matcher
        .search(a.id, "systems", SearchCriteria::skills(["Rust", "C", "Zig", "Go"]))
        .await
        .unwrap();

    assert_eq!(outcome.matches.len(), 1);
    assert!((outcome.matches[0].match_score - 0.625).abs() < 1e-9);
}

type Hook = Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send>;

/// Memory store that runs a one-off action at chosen points of a call,
/// to pin down interleavings with concurrent callers.
#[derive(Default)]
struct HookedStore {
    inner: MemoryStore,
    before_transition: Mutex<Option<Hook>>,
    after_profile_read: Mutex<Option<Hook>>,
}

impl HookedStore {
    fn hook<F, Fut>(slot: &Mutex<Option<Hook>>, action: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        *slot.lock().unwrap() = Some(Box::new(move || Box::pin(action())));
    }

    async fn fire(slot: &Mutex<Option<Hook>>) {
        let hook = slot.lock().unwrap().take();
        if let Some(hook) = hook {
            hook().await;
        }
    }
}

#[async_trait]
impl NetworkStore for HookedStore {
    async fn insert_user(&self, user: User) -> NetworkResult<User> {
        self.inner.insert_user(user).await
    }

    async fn get_user(&self, user_id: UserId) -> NetworkResult<Option<User>> {
        self.inner.get_user(user_id).await
    }

    async fn list_users(&self) -> NetworkResult<Vec<User>> {
        self.inner.list_users().await
    }

    async fn upsert_profile(&self, profile: Profile) -> NetworkResult<Profile> {
        self.inner.upsert_profile(profile).await
    }

    async fn get_profile(&self, user_id: UserId) -> NetworkResult<Option<Profile>> {
        let profile = self.inner.get_profile(user_id).await;
        Self::fire(&self.after_profile_read).await;
        profile
    }

    async fn insert_connection(&self, a: UserId, b: UserId, trust: f64) -> NetworkResult<Connection> {
        self.inner.insert_connection(a, b, trust).await
    }

    async fn neighbors(&self, user_id: UserId) -> NetworkResult<Vec<Neighbor>> {
        self.inner.neighbors(user_id).await
    }

    async fn trust_between(&self, a: UserId, b: UserId) -> NetworkResult<Option<f64>> {
        self.inner.trust_between(a, b).await
    }

    async fn insert_request(&self, request: ServiceRequest) -> NetworkResult<ServiceRequest> {
        self.inner.insert_request(request).await
    }

    async fn get_request(&self, request_id: RequestId) -> NetworkResult<Option<ServiceRequest>> {
        self.inner.get_request(request_id).await
    }

    async fn transition_request(
        &self,
        request_id: RequestId,
        to: RequestStatus,
    ) -> NetworkResult<ServiceRequest> {
        Self::fire(&self.before_transition).await;
        self.inner.transition_request(request_id, to).await
    }

    async fn mark_broadcast(
        &self,
        request_id: RequestId,
        messages: Vec<AgentMessage>,
    ) -> NetworkResult<ServiceRequest> {
        self.inner.mark_broadcast(request_id, messages).await
    }

    async fn insert_response(&self, response: AgentResponse) -> NetworkResult<AgentResponse> {
        self.inner.insert_response(response).await
    }

    async fn responses_for(&self, request_id: RequestId) -> NetworkResult<Vec<AgentResponse>> {
        self.inner.responses_for(request_id).await
    }

    async fn append_message(&self, message: AgentMessage) -> NetworkResult<()> {
        self.inner.append_message(message).await
    }

    async fn messages_for_request(&self, request_id: RequestId) -> NetworkResult<Vec<AgentMessage>> {
        self.inner.messages_for_request(request_id).await
    }

    async fn health_check(&self) -> NetworkResult<bool> {
        self.inner.health_check().await
    }
}

#[tokio::test]
async fn test_finalized_ranking_includes_responses_racing_completion() {
    let store = Arc::new(HookedStore::default());
    let matcher = Matcher::new(store.clone());
    let a = register(&matcher, "Ada").await;
    let b = register(&matcher, "Bea").await;
    let c = register(&matcher, "Cal").await;
    with_skills(&matcher, &b, "Engineer", &["Rust"]).await;
    with_skills(&matcher, &c, "Engineer", &["Rust"]).await;
    matcher.create_connection(a.id, b.id, 0.5).await.unwrap();
    matcher.create_connection(a.id, c.id, 0.9).await.unwrap();

    let request = matcher
        .create_request(a.id, "rust", SearchCriteria::skills(["Rust"]))
        .await
        .unwrap();
    matcher.respond(request.id, b.id, None).await.unwrap();

    // Cal's verdict lands while completion is in flight
    let racer = matcher.clone();
    let (request_id, late) = (request.id, c.id);
    HookedStore::hook(&store.before_transition, move || async move {
        racer.respond(request_id, late, None).await.unwrap();
    });

    let finalized = matcher.finalize_request(request.id).await.unwrap();
    let after = matcher.get_ranked_results(request.id).await.unwrap();

    assert_eq!(finalized, after);
    assert_eq!(
        finalized.iter().map(|m| m.candidate_id).collect::<Vec<_>>(),
        vec![c.id, b.id]
    );
    assert_eq!(
        matcher.respond(request.id, c.id, None).await,
        Err(NetworkError::RequestNotActive(request.id))
    );
}

#[tokio::test]
async fn test_profile_saved_during_read_is_not_shadowed_by_cache() {
    let store = Arc::new(HookedStore::default());
    let matcher = Matcher::new(store.clone()).with_cache(Arc::new(CacheManager::in_memory(100, 60)));
    let dee = register(&matcher, "Dee").await;
    with_skills(&matcher, &dee, "Engineer", &["Go"]).await;

    // The save lands after the read fetched the old row but before it fills the cache
    let writer = matcher.clone();
    let user_id = dee.id;
    HookedStore::hook(&store.after_profile_read, move || async move {
        writer.save_profile(Profile::with_skills(user_id, ["Rust"])).await.unwrap();
    });

    let stale = matcher.get_profile(dee.id).await.unwrap();
    assert!(stale.skills.contains("Go"));

    let fresh = matcher.get_profile(dee.id).await.unwrap();
    assert!(fresh.skills.contains("Rust"));
    assert!(!fresh.skills.contains("Go"));
}

#[derive(Default)]
struct CountingSimilarity {
    calls: AtomicUsize,
}

#[async_trait]
impl SimilaritySource for CountingSimilarity {
    async fn similarity(&self, _request_id: Uuid, _candidate_id: Uuid) -> Option<f64> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Some(1.0)
    }
}

#[tokio::test]
async fn test_similarity_fetched_before_evaluations_start() {
    let similarity = Arc::new(CountingSimilarity::default());
    let matcher = Matcher::new(Arc::new(MemoryStore::new()))
        .with_similarity(similarity.clone())
        .with_policy(MatchPolicy {
            match_threshold: 0.5,
            semantic_weight: 0.5,
        })
        .unwrap();

    let a = register(&matcher, "Ada").await;
    for name in ["Bea", "Cal", "Dan"] {
        let peer = register(&matcher, name).await;
        with_skills(&matcher, &peer, "Engineer", &["Rust"]).await;
        matcher.create_connection(a.id, peer.id, 0.5).await.unwrap();
    }
    let request = matcher
        .create_request(a.id, "systems", SearchCriteria::skills(["Rust", "C", "Zig", "Go"]))
        .await
        .unwrap();

    let pending = matcher.broadcast(a.id, request.id).await.unwrap();
    assert_eq!(similarity.calls.load(Ordering::SeqCst), 3);

    let summary = pending.wait().await;
    assert_eq!(summary.matched, 3);
    assert_eq!(similarity.calls.load(Ordering::SeqCst), 3);

    let ranked = matcher.get_ranked_results(request.id).await.unwrap();
    assert!(ranked.iter().all(|m| (m.match_score - 0.625).abs() < 1e-9));
}

#[tokio::test]
async fn test_similarity_not_fetched_without_semantic_weight() {
    let similarity = Arc::new(CountingSimilarity::default());
    let matcher = Matcher::new(Arc::new(MemoryStore::new())).with_similarity(similarity.clone());

    let a = register(&matcher, "Ada").await;
    let b = register(&matcher, "Bea").await;
    with_skills(&matcher, &b, "Engineer", &["Rust"]).await;
    matcher.create_connection(a.id, b.id, 0.5).await.unwrap();

    let outcome = matcher
        .search(a.id, "rust", SearchCriteria::skills(["Rust"]))
        .await
        .unwrap();
    assert_eq!(outcome.matches.len(), 1);

    let request = matcher
        .create_request(a.id, "rust", SearchCriteria::skills(["Rust"]))
        .await
        .unwrap();
    matcher.respond(request.id, b.id, None).await.unwrap();

    assert_eq!(similarity.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_ranking_while_evaluations_are_running() {
    let matcher = Matcher::new(Arc::new(MemoryStore::new())).with_max_parallel_evaluations(2);
    let a = register(&matcher, "Ada").await;

    let mut matching = HashSet::new();
    for i in 0..24 {
        let peer = register(&matcher, &format!("Peer{}", i)).await;
        let skills: &[&str] = if i % 3 == 0 { &["Go"] } else { &["Rust", "Go"] };
        with_skills(&matcher, &peer, "Engineer", skills).await;
        matcher
            .create_connection(a.id, peer.id, (i % 10) as f64 / 10.0)
            .await
            .unwrap();
        if i % 3 != 0 {
            matching.insert(peer.id);
        }
    }

    let request = matcher
        .create_request(a.id, "rust", SearchCriteria::skills(["Rust"]))
        .await
        .unwrap();
    let pending = matcher.broadcast(a.id, request.id).await.unwrap();
    let evaluations = tokio::spawn(pending.wait());

    let mut seen = 0;
    while !evaluations.is_finished() {
        let snapshot = matcher.get_ranked_results(request.id).await.unwrap();
        assert!(snapshot.len() >= seen);
        assert!(snapshot.iter().all(|m| matching.contains(&m.candidate_id)));
        assert!(snapshot.windows(2).all(|w| {
            w[0].final_score > w[1].final_score
                || (w[0].final_score == w[1].final_score && w[0].candidate_id < w[1].candidate_id)
        }));
        seen = snapshot.len();
        tokio::task::yield_now().await;
    }

    let summary = evaluations.await.unwrap();
    assert_eq!(summary.recorded, 24);
    assert_eq!(summary.matched, matching.len());

    let ranked = matcher.get_ranked_results(request.id).await.unwrap();
    assert_eq!(ranked.len(), matching.len());
    assert!(ranked.len() >= seen);
}
