use crate::core::error::{NetworkError, NetworkResult};
use crate::models::{AgentResponse, RankedMatch, RankingWeights, UserId};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Trust assumed when no edge links the requester and the candidate
pub const DEFAULT_TRUST: f64 = 1.0;

impl RankingWeights {
    pub fn validate(&self) -> NetworkResult<()> {
        let in_range = |w: f64| (0.0..=1.0).contains(&w);
        if !in_range(self.match_score) || !in_range(self.trust) {
            return Err(NetworkError::InvalidInput(format!(
                "ranking weights must be within [0, 1], got {:?}",
                self
            )));
        }
        if (self.match_score + self.trust - 1.0).abs() > 1e-6 {
            return Err(NetworkError::InvalidInput(format!(
                "ranking weights must sum to 1, got {}",
                self.match_score + self.trust
            )));
        }
        Ok(())
    }
}

/// Display fields of a candidate, joined in from users and profiles
#[derive(Debug, Clone, Default)]
pub struct CandidateCard {
    pub name: String,
    pub title: Option<String>,
}

/// Final ranking key.
///
/// finalScore = matchScore * 0.7 + trustScore * 0.3 with the default weights.
#[inline]
pub fn calculate_final_score(match_score: f64, trust_score: f64, weights: &RankingWeights) -> f64 {
    (match_score * weights.match_score + trust_score * weights.trust).clamp(0.0, 1.0)
}

/// Order matches by final score (descending), then candidate id (ascending)
#[inline]
pub fn compare_ranked(a: &RankedMatch, b: &RankedMatch) -> Ordering {
    b.final_score
        .total_cmp(&a.final_score)
        .then_with(|| a.candidate_id.cmp(&b.candidate_id))
}

/// Rank a snapshot of responses for one request.
///
/// Only matching responses are kept. `trust` maps candidate to edge weight;
/// missing entries fall back to `DEFAULT_TRUST`.
pub fn rank_responses(
    responses: &[AgentResponse],
    trust: &HashMap<UserId, f64>,
    cards: &HashMap<UserId, CandidateCard>,
    weights: &RankingWeights,
) -> Vec<RankedMatch> {
    let mut ranked: Vec<RankedMatch> = responses
        .iter()
        .filter(|response| response.is_match)
        .map(|response| {
            let trust_score = trust
                .get(&response.responder_id)
                .copied()
                .unwrap_or(DEFAULT_TRUST);
            let card = cards.get(&response.responder_id).cloned().unwrap_or_default();

            RankedMatch {
                candidate_id: response.responder_id,
                name: card.name,
                title: card.title,
                match_score: response.match_score,
                matched_skills: response.matched_skills.clone(),
                explanation: response.explanation.clone(),
                trust_score,
                final_score: calculate_final_score(response.match_score, trust_score, weights),
            }
        })
        .collect();

    ranked.sort_by(compare_ranked);
    ranked
}
