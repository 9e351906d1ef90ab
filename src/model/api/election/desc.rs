use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::id::ApiId,
    common::election::ElectionStatus,
    db::election::{Candidate, Election},
};

/// An API-friendly election description, containing no sensitive data or weird formats.
/// In particular, the passcode hash never leaves the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionDescription {
    pub id: ApiId,
    pub title: String,
    pub description: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub is_public: bool,
    pub status: ElectionStatus,
    pub candidates: Vec<CandidateDescription>,
    pub total_votes: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateDescription {
    pub id: ApiId,
    pub name: String,
    pub position: String,
    pub votes: u32,
}

impl From<Candidate> for CandidateDescription {
    fn from(candidate: Candidate) -> Self {
        Self {
            id: candidate.id.into(),
            name: candidate.name,
            position: candidate.position,
            votes: candidate.votes,
        }
    }
}

impl From<Election> for ElectionDescription {
    fn from(election: Election) -> Self {
        let id = election.id.into();
        let election = election.election;
        Self {
            id,
            title: election.title,
            description: election.description,
            start_date: election.start_time,
            end_date: election.end_time,
            is_public: election.is_public,
            status: election.status,
            candidates: election.candidates.into_iter().map(Into::into).collect(),
            total_votes: election.total_votes,
        }
    }
}
