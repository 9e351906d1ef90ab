use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use log::info;
use mongodb::bson::{doc, serde_helpers::chrono_datetime_as_bson_datetime, DateTime as BsonDateTime, Document};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{
    common::election::ElectionStatus,
    mongodb::{Coll, Id},
    secret::verify_secret,
};

/// A candidate, embedded in its election.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "_id")]
    pub id: Id,
    pub name: String,
    /// Display label; set to the election title on creation.
    pub position: String,
    pub votes: u32,
}

impl Candidate {
    /// A candidate with a fresh ID and no votes.
    pub fn new(name: String, position: String) -> Self {
        Self {
            id: Id::new(),
            name,
            position,
            votes: 0,
        }
    }
}

/// Core election data, as stored in the database.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct ElectionCore {
    pub title: String,
    pub description: String,
    /// Voting opens at this time.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub start_time: DateTime<Utc>,
    /// Voting closes after this time.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub end_time: DateTime<Utc>,
    /// Private elections require a passcode to vote.
    pub is_public: bool,
    /// Argon2 hash of the passcode; present iff the election is private.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passcode_hash: Option<String>,
    /// Last persisted lifecycle status. May lag behind the clock until the next sweep.
    pub status: ElectionStatus,
    pub candidates: Vec<Candidate>,
    /// Always equal to the sum of candidate votes.
    pub total_votes: u32,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl ElectionCore {
    /// The effective status at time `now`, never earlier than the persisted one.
    pub fn status_at(&self, now: DateTime<Utc>) -> ElectionStatus {
        self.status
            .advance(ElectionStatus::derive(now, self.start_time, self.end_time))
    }

    /// Find a candidate of this election by ID.
    pub fn candidate(&self, candidate_id: Id) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.id == candidate_id)
    }

    /// Check a passcode. Public elections accept anything.
    pub fn verify_passcode(&self, passcode: Option<&str>) -> bool {
        if self.is_public {
            return true;
        }
        match (&self.passcode_hash, passcode) {
            (Some(hash), Some(passcode)) => verify_secret(hash, passcode),
            _ => false,
        }
    }

    /// Does `total_votes` agree with the candidate counters?
    pub fn tally_is_consistent(&self) -> bool {
        let sum: u64 = self.candidates.iter().map(|c| u64::from(c.votes)).sum();
        sum == u64::from(self.total_votes)
    }
}

/// An election without an ID.
pub type NewElection = ElectionCore;

/// An election from the database, with its unique ID.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Election {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub election: ElectionCore,
}

impl Election {
    /// Persist every status transition that has become due by `now`.
    ///
    /// Only forward transitions are written, so repeated or concurrent sweeps are harmless.
    /// Returns the number of elections that changed status.
    pub async fn sweep(elections: &Coll<Election>, now: DateTime<Utc>) -> Result<u64> {
        let now = BsonDateTime::from_chrono(now);

        // Close anything whose window has passed, including ones that never opened.
        let closed = elections
            .update_many(
                doc! {
                    "status": { "$ne": ElectionStatus::Completed },
                    "end_time": { "$lt": now },
                },
                doc! { "$set": { "status": ElectionStatus::Completed } },
                None,
            )
            .await?
            .modified_count;

        // Open anything whose window has started. Past windows were closed above.
        let opened = elections
            .update_many(
                doc! {
                    "status": ElectionStatus::Upcoming,
                    "start_time": { "$lte": now },
                },
                doc! { "$set": { "status": ElectionStatus::Ongoing } },
                None,
            )
            .await?
            .modified_count;

        if closed + opened > 0 {
            info!("Lifecycle sweep: {opened} election(s) opened, {closed} closed");
        }
        Ok(closed + opened)
    }

    /// Filter matching elections whose voting window contains `now`.
    pub fn active_filter(now: DateTime<Utc>) -> Document {
        let now = BsonDateTime::from_chrono(now);
        doc! {
            "start_time": { "$lte": now },
            "end_time": { "$gte": now },
        }
    }
}

impl Deref for Election {
    type Target = ElectionCore;

    fn deref(&self) -> &Self::Target {
        &self.election
    }
}

impl DerefMut for Election {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.election
    }
}
