use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{
    common::election::ElectionStatus,
    db::election::{Candidate, NewElection},
    secret::hash_secret,
};

/// Fewest candidates an election can be created with.
pub const MIN_CANDIDATES: usize = 2;

/// A new election, as submitted by an administrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionSpec {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    /// Candidate names, in display order.
    pub candidates: Vec<String>,
    #[serde(default = "default_is_public")]
    pub is_public: bool,
    /// Required iff the election is private.
    #[serde(default)]
    pub passcode: Option<String>,
}

fn default_is_public() -> bool {
    true
}

/// Reasons an [`ElectionSpec`] can be rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SpecError {
    #[error("Election title is required")]
    MissingTitle,
    #[error("At least {MIN_CANDIDATES} candidates are required")]
    TooFewCandidates,
    #[error("Candidate names cannot be empty")]
    EmptyCandidateName,
    #[error("Election must end after it starts")]
    EndsBeforeStart,
    #[error("Private elections require a passcode")]
    MissingPasscode,
}

impl ElectionSpec {
    /// Check this describes a well-formed election.
    pub fn validate(&self) -> Result<(), SpecError> {
        if self.title.trim().is_empty() {
            return Err(SpecError::MissingTitle);
        }
        if self.candidates.len() < MIN_CANDIDATES {
            return Err(SpecError::TooFewCandidates);
        }
        if self.candidates.iter().any(|name| name.trim().is_empty()) {
            return Err(SpecError::EmptyCandidateName);
        }
        if self.end_date <= self.start_date {
            return Err(SpecError::EndsBeforeStart);
        }
        let has_passcode = self
            .passcode
            .as_deref()
            .map_or(false, |passcode| !passcode.is_empty());
        if !self.is_public && !has_passcode {
            return Err(SpecError::MissingPasscode);
        }
        Ok(())
    }

    /// Convert into a new election as of time `now`.
    ///
    /// The initial status is derived from the window. Candidates start on zero votes,
    /// labelled with the election title. A passcode on a public election is dropped.
    pub fn into_election(self, now: DateTime<Utc>) -> Result<NewElection, argon2::Error> {
        let title = self.title.trim().to_string();
        let passcode_hash = match self.passcode.filter(|_| !self.is_public) {
            Some(passcode) => Some(hash_secret(&passcode)?),
            None => None,
        };
        let candidates = self
            .candidates
            .into_iter()
            .map(|name| Candidate::new(name.trim().to_string(), title.clone()))
            .collect();

        Ok(NewElection {
            status: ElectionStatus::derive(now, self.start_date, self.end_date),
            title,
            description: self.description,
            start_time: self.start_date,
            end_time: self.end_date,
            is_public: self.is_public,
            passcode_hash,
            candidates,
            total_votes: 0,
            created_at: now,
        })
    }
}

/// A passcode offered for a private election.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasscodeRequest {
    pub passcode: String,
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn examples_are_valid() {
        assert_eq!(ElectionSpec::current_example().validate(), Ok(()));
        assert_eq!(ElectionSpec::private_example().validate(), Ok(()));
        assert_eq!(ElectionSpec::future_example().validate(), Ok(()));
        assert_eq!(ElectionSpec::past_example().validate(), Ok(()));
    }

    #[test]
    fn validation_failures() {
        let mut spec = ElectionSpec::current_example();
        spec.title = "   ".into();
        assert_eq!(spec.validate(), Err(SpecError::MissingTitle));

        let mut spec = ElectionSpec::current_example();
        spec.candidates = vec!["Only".into()];
        assert_eq!(spec.validate(), Err(SpecError::TooFewCandidates));

        let mut spec = ElectionSpec::current_example();
        spec.candidates.push(" ".into());
        assert_eq!(spec.validate(), Err(SpecError::EmptyCandidateName));

        let mut spec = ElectionSpec::current_example();
        spec.end_date = spec.start_date;
        assert_eq!(spec.validate(), Err(SpecError::EndsBeforeStart));

        let mut spec = ElectionSpec::private_example();
        spec.passcode = Some(String::new());
        assert_eq!(spec.validate(), Err(SpecError::MissingPasscode));
        spec.passcode = None;
        assert_eq!(spec.validate(), Err(SpecError::MissingPasscode));
    }

    #[test]
    fn initial_status_is_derived() {
        let now = Utc::now();
        let status = |spec: ElectionSpec| spec.into_election(now).unwrap().status;

        assert_eq!(status(ElectionSpec::current_example()), ElectionStatus::Ongoing);
        assert_eq!(status(ElectionSpec::future_example()), ElectionStatus::Upcoming);
        assert_eq!(status(ElectionSpec::past_example()), ElectionStatus::Completed);
    }

    #[test]
    fn candidates_start_at_zero_with_title_position() {
        let election = ElectionSpec::private_example()
            .into_election(Utc::now())
            .unwrap();

        let names: Vec<_> = election.candidates.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Chidi", "Ngozi", "Emeka"]);
        assert!(election
            .candidates
            .iter()
            .all(|c| c.votes == 0 && c.position == "Faculty Representative"));
        assert_eq!(election.total_votes, 0);

        // Each candidate gets its own ID.
        assert_ne!(election.candidates[0].id, election.candidates[1].id);
        assert_ne!(election.candidates[1].id, election.candidates[2].id);

        // The passcode is never stored in the clear.
        let hash = election.passcode_hash.as_deref().unwrap();
        assert_ne!(hash, "s3cret");
    }

    #[test]
    fn public_election_drops_passcode() {
        let mut spec = ElectionSpec::current_example();
        spec.passcode = Some("ignored".into());
        assert_eq!(spec.validate(), Ok(()));
        assert_eq!(spec.into_election(Utc::now()).unwrap().passcode_hash, None);
    }

    #[test]
    fn deserialises_camel_case() {
        let spec: ElectionSpec = rocket::serde::json::from_str(
            r#"{
                "title": "Library Board",
                "description": "",
                "startDate": "2030-01-01T08:00:00Z",
                "endDate": "2030-01-01T18:00:00Z",
                "candidates": ["X", "Y"],
                "isPublic": false,
                "passcode": "books"
            }"#,
        )
        .unwrap();
        assert!(!spec.is_public);
        assert_eq!(spec.passcode.as_deref(), Some("books"));
        assert_eq!(spec.validate(), Ok(()));
    }
}
