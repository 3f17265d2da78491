use crate::core::error::{NetworkError, NetworkResult};
use crate::core::filters::{matched_skills, matches_availability};
use crate::models::{MatchPolicy, MatchResult, Profile, SearchCriteria};

impl MatchPolicy {
    pub fn validate(&self) -> NetworkResult<()> {
        if !(0.0..=1.0).contains(&self.match_threshold) {
            return Err(NetworkError::InvalidInput(format!(
                "match threshold must be within [0, 1], got {}",
                self.match_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.semantic_weight) {
            return Err(NetworkError::InvalidInput(format!(
                "semantic weight must be within [0, 1], got {}",
                self.semantic_weight
            )));
        }
        Ok(())
    }
}

/// Fraction of required skills present in the profile.
///
/// A request with no required skills scores 0 so it never matches anyone.
#[inline]
pub fn skill_overlap_score(matched: usize, required: usize) -> f64 {
    if required == 0 {
        return 0.0;
    }
    matched as f64 / required as f64
}

/// Evaluate one candidate against a request's criteria.
///
/// Pure and deterministic. `similarity` is the optional precomputed semantic
/// score; it is blended in only when the policy gives it weight, and never
/// rescues a request that has no required skills.
pub fn evaluate(
    criteria: &SearchCriteria,
    profile: &Profile,
    similarity: Option<f64>,
    policy: &MatchPolicy,
) -> MatchResult {
    let matched = matched_skills(criteria, profile);
    let required = criteria.required_skills.len();
    let skill_score = skill_overlap_score(matched.len(), required);

    let score = match similarity {
        Some(sim) if required > 0 && policy.semantic_weight > 0.0 => {
            let sim = if sim.is_nan() { 0.0 } else { sim.clamp(0.0, 1.0) };
            skill_score * (1.0 - policy.semantic_weight) + sim * policy.semantic_weight
        }
        _ => skill_score,
    };

    let mut explanation = format!("Matched {} of {} required skills.", matched.len(), required);

    let availability_ok = matches_availability(criteria, profile);
    if !availability_ok {
        if let Some(wanted) = criteria.availability {
            explanation.push_str(&format!(
                " Availability mismatch: wanted {}, candidate is {}.",
                wanted.as_str(),
                profile.availability.as_str()
            ));
        }
    }

    let is_match = required > 0 && availability_ok && score >= policy.match_threshold;

    MatchResult {
        is_match,
        score,
        matched_skills: matched,
        explanation,
    }
}
