use crate::models::{Availability, Profile, SearchCriteria};
use std::collections::BTreeSet;

/// Required skills present in the candidate's profile.
///
/// Exact, case-sensitive string comparison; no fuzzy matching.
#[inline]
pub fn matched_skills(criteria: &SearchCriteria, profile: &Profile) -> BTreeSet<String> {
    criteria
        .required_skills
        .intersection(&profile.skills)
        .cloned()
        .collect()
}

/// Check the optional availability filter.
///
/// Passes when the criteria name no availability, or the candidate has not
/// stated one.
#[inline]
pub fn matches_availability(criteria: &SearchCriteria, profile: &Profile) -> bool {
    match criteria.availability {
        None | Some(Availability::Unspecified) => true,
        Some(wanted) => {
            profile.availability == Availability::Unspecified || profile.availability == wanted
        }
    }
}
