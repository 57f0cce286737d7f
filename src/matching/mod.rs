//! Teacher/student compatibility scoring.
//!
//! Scores are integer percentages in `0..=100`. Three weighted components contribute:
//! teaching proficiency (50%), same department (30%) and seniority over the requester (20%,
//! saturating at a four-year gap). Candidates junior to or in the same year as the requester get
//! no seniority credit.

use serde::Serialize;

pub const PROFICIENCY_WEIGHT: f64 = 0.5;
pub const DEPARTMENT_WEIGHT: f64 = 0.3;
pub const SENIORITY_WEIGHT: f64 = 0.2;

/// Proficiency scale maximum; a level equal to this earns the full component.
const PROFICIENCY_SCALE: f64 = 5.0;
/// Year gap at which the seniority component saturates.
const SENIORITY_CAP_YEARS: f64 = 4.0;
const FULL: f64 = 100.0;

/// The attributes of a potential teacher that the score looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateProfile {
    pub proficiency_level: i64,
    pub department: String,
    pub study_year: i64,
}

/// The attributes of the student asking for help.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequesterProfile {
    pub department: String,
    pub study_year: i64,
}

/// Raw, unweighted component scores, each in `0..=100` for valid input.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub proficiency_score: f64,
    pub department_score: f64,
    pub year_score: f64,
    pub department_match: bool,
    /// Absolute difference in study years.
    pub year_difference: i64,
}

impl ScoreBreakdown {
    fn weighted_total(&self) -> f64 {
        self.proficiency_score * PROFICIENCY_WEIGHT
            + self.department_score * DEPARTMENT_WEIGHT
            + self.year_score * SENIORITY_WEIGHT
    }
}

/// Compute the three component scores.
pub fn breakdown(candidate: &CandidateProfile, requester: &RequesterProfile) -> ScoreBreakdown {
    let proficiency_score = (candidate.proficiency_level as f64 / PROFICIENCY_SCALE) * FULL;

    let department_match = candidate.department == requester.department;
    let department_score = if department_match { FULL } else { 0.0 };

    let year_score = if candidate.study_year <= requester.study_year {
        0.0
    } else {
        let gap = (candidate.study_year - requester.study_year) as f64;
        ((gap / SENIORITY_CAP_YEARS) * FULL).min(FULL)
    };

    ScoreBreakdown {
        proficiency_score,
        department_score,
        year_score,
        department_match,
        year_difference: (candidate.study_year - requester.study_year).abs(),
    }
}

/// Compatibility score of `candidate` for `requester`, in `0..=100`.
pub fn score(candidate: &CandidateProfile, requester: &RequesterProfile) -> u8 {
    breakdown(candidate, requester)
        .weighted_total()
        .round()
        .clamp(0.0, FULL) as u8
}

/// An eligible teacher for a request, before scoring.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub user_id: String,
    pub username: String,
    pub department: String,
    pub study_year: i64,
    pub proficiency_level: i64,
    /// A pending match for this request already targets this candidate.
    pub has_request_pending: bool,
}

impl Candidate {
    fn profile(&self) -> CandidateProfile {
        CandidateProfile {
            proficiency_level: self.proficiency_level,
            department: self.department.clone(),
            study_year: self.study_year,
        }
    }
}

/// A scored candidate, as returned to the requester.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedCandidate {
    pub user_id: String,
    pub username: String,
    pub department: String,
    pub study_year: i64,
    pub proficiency_level: i64,
    pub has_request_pending: bool,
    pub score: u8,
    pub match_details: ScoreBreakdown,
}

/// Score every candidate and order them best first.
///
/// Equal scores are ordered by ascending user id so the ranking is reproducible.
pub fn rank(candidates: Vec<Candidate>, requester: &RequesterProfile) -> Vec<RankedCandidate> {
    let mut ranked: Vec<RankedCandidate> = candidates
        .into_iter()
        .map(|candidate| {
            let profile = candidate.profile();
            RankedCandidate {
                score: score(&profile, requester),
                match_details: breakdown(&profile, requester),
                user_id: candidate.user_id,
                username: candidate.username,
                department: candidate.department,
                study_year: candidate.study_year,
                proficiency_level: candidate.proficiency_level,
                has_request_pending: candidate.has_request_pending,
            }
        })
        .collect();

    ranked.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.user_id.cmp(&b.user_id)));
    ranked
}
