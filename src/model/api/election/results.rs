use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::id::ApiId,
    db::election::{Candidate, Election},
};

/// The outcome of a completed election.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Winner {
    /// Exactly one candidate received the most votes.
    Candidate(ApiId),
    /// Several candidates share the most votes.
    Draw,
}

/// A candidate's final standing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateResult {
    pub id: ApiId,
    pub name: String,
    pub position: String,
    pub votes: u32,
    /// Share of the election's total, in percent, to 2 decimal places.
    pub percentage: f64,
}

/// Aggregated results of a completed election.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionResults {
    pub id: ApiId,
    pub title: String,
    pub description: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub total_votes: u32,
    /// Sorted by votes, most first. Tied candidates keep their ballot order.
    pub candidates: Vec<CandidateResult>,
    /// `None` only for an election without candidates.
    pub winner: Option<Winner>,
}

impl From<Election> for ElectionResults {
    fn from(election: Election) -> Self {
        let id = election.id.into();
        let election = election.election;
        let (candidates, winner) = rank_candidates(election.candidates, election.total_votes);
        Self {
            id,
            title: election.title,
            description: election.description,
            start_date: election.start_time,
            end_date: election.end_time,
            total_votes: election.total_votes,
            candidates,
            winner,
        }
    }
}

/// Sort candidates by descending votes, attach percentages and pick the winner.
pub fn rank_candidates(
    mut candidates: Vec<Candidate>,
    total_votes: u32,
) -> (Vec<CandidateResult>, Option<Winner>) {
    // Stable, so ties keep their original order.
    candidates.sort_by(|a, b| b.votes.cmp(&a.votes));

    let winner = match candidates.as_slice() {
        [] => None,
        [only] => Some(Winner::Candidate(only.id.into())),
        [first, second, ..] if first.votes == second.votes => Some(Winner::Draw),
        [first, ..] => Some(Winner::Candidate(first.id.into())),
    };

    let results = candidates
        .into_iter()
        .map(|candidate| CandidateResult {
            id: candidate.id.into(),
            percentage: percentage(candidate.votes, total_votes),
            name: candidate.name,
            position: candidate.position,
            votes: candidate.votes,
        })
        .collect();

    (results, winner)
}

fn percentage(votes: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let exact = f64::from(votes) * 100.0 / f64::from(total);
    (exact * 100.0).round() / 100.0
}
