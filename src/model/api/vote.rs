use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{api::id::ApiId, db::vote::Vote};

/// A ballot submitted by an authenticated user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    /// Redundant with the route; checked for agreement when present.
    #[serde(default)]
    pub election_id: Option<ApiId>,
    pub candidate_id: ApiId,
    /// Needed for private elections only.
    #[serde(default)]
    pub passcode: Option<String>,
}

/// An entry in a user's voting history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRecord {
    pub id: ApiId,
    pub election_id: ApiId,
    pub candidate_id: ApiId,
    pub cast_at: DateTime<Utc>,
}

impl From<Vote> for VoteRecord {
    fn from(vote: Vote) -> Self {
        Self {
            id: vote.id.into(),
            election_id: vote.election_id.into(),
            candidate_id: vote.candidate_id.into(),
            cast_at: vote.cast_at,
        }
    }
}
