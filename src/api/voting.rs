use std::time::Duration;

use chrono::Utc;
use log::{debug, info, warn};
use mongodb::{
    bson::doc,
    error::{TRANSIENT_TRANSACTION_ERROR, UNKNOWN_TRANSACTION_COMMIT_RESULT},
    Client, ClientSession,
};
use rand::Rng;
use rocket::{http::Status, serde::json::Json, tokio::time::sleep, Route, State};

use crate::error::{Error, Result};
use crate::logging::RequestId;
use crate::model::{
    api::{auth::AuthToken, vote::VoteRequest},
    common::election::ElectionStatus,
    db::{election::Election, user::User, vote::NewVote},
    mongodb::{is_duplicate_key_error, Coll, Id},
};

/// Attempts at a vote transaction, or at committing one, before giving up.
const MAX_TRANSACTION_ATTEMPTS: u32 = 10;

pub fn routes() -> Vec<Route> {
    routes![submit_vote]
}

fn already_voted() -> Error {
    Error::bad_request("You already voted")
}

/// Write conflicts and replica set failovers abort a
/// transaction without it having taken effect, so it can be run again.
fn is_transient(err: &Error) -> bool {
    matches!(err, Error::Db(e) if e.contains_label(TRANSIENT_TRANSACTION_ERROR))
}

#[post("/elections/<election_id>/votes", data = "<request>", format = "json")]
async fn submit_vote(
    request_id: &RequestId,
    token: AuthToken,
    election_id: Id,
    request: Json<VoteRequest>,
    elections: Coll<Election>,
    users: Coll<User>,
    new_votes: Coll<NewVote>,
    db_client: &State<Client>,
) -> Result<&'static str> {
    if let Some(body_id) = request.election_id {
        if Id::from(body_id) != election_id {
            return Err(Error::bad_request("Election ID does not match the URL"));
        }
    }

    let now = Utc::now();
    let election = elections
        .find_one(election_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {election_id}")))?;

    let candidate_id = Id::from(request.candidate_id);
    if election.candidate(candidate_id).is_none() {
        return Err(Error::not_found(format!(
            "Candidate {candidate_id} in election {election_id}"
        )));
    }
    if election.status_at(now) != ElectionStatus::Ongoing {
        return Err(Error::bad_request("Election is not open for voting"));
    }
    if !election.verify_passcode(request.passcode.as_deref()) {
        warn!(
            "{request_id} vote in election {election_id} with wrong passcode by {}",
            token.id()
        );
        return Err(Error::forbidden("Incorrect passcode"));
    }

    let vote = NewVote::new(token.id(), election_id, candidate_id, now);
    let mut session = db_client.start_session(None).await?;
    run_vote_transaction(&mut session, &users, &elections, &new_votes, &vote).await?;

    info!(
        "{request_id} user {} voted for {candidate_id} in election {election_id}",
        token.id()
    );
    Ok("Vote submitted")
}

/// Record a vote in its own transaction, running it again from the start
/// whenever it fails transiently. Concurrent votes in one election all touch
/// the election document, so conflicts are routine under load.
async fn run_vote_transaction(
    session: &mut ClientSession,
    users: &Coll<User>,
    elections: &Coll<Election>,
    new_votes: &Coll<NewVote>,
    vote: &NewVote,
) -> Result<()> {
    let mut attempt = 1;
    loop {
        session.start_transaction(None).await?;
        let result = match record_vote(session, users, elections, new_votes, vote).await {
            Ok(()) => commit_with_retry(session).await,
            Err(err) => {
                if let Err(abort_err) = session.abort_transaction().await {
                    debug!("Failed to abort vote transaction: {abort_err}");
                }
                Err(err)
            }
        };

        match result {
            Err(err) if is_transient(&err) && attempt < MAX_TRANSACTION_ATTEMPTS => {
                debug!(
                    "Vote by {} in election {} conflicted (attempt {attempt}): {err}",
                    vote.user_id, vote.election_id
                );
                let backoff = rand::thread_rng().gen_range(0..=10 * u64::from(attempt));
                sleep(Duration::from_millis(backoff)).await;
                attempt += 1;
            }
            Err(err) if is_transient(&err) => {
                warn!(
                    "Gave up on vote by {} in election {} after {attempt} attempts: {err}",
                    vote.user_id, vote.election_id
                );
                return Err(Error::Status(
                    Status::Conflict,
                    "Too many votes are being recorded, please retry".to_string(),
                ));
            }
            result => return result,
        }
    }
}

/// Commit the open transaction, retrying while the outcome of a commit is unknown.
async fn commit_with_retry(session: &mut ClientSession) -> Result<()> {
    let mut attempt = 1;
    loop {
        match session.commit_transaction().await {
            Err(err)
                if err.contains_label(UNKNOWN_TRANSACTION_COMMIT_RESULT)
                    && attempt < MAX_TRANSACTION_ATTEMPTS =>
            {
                debug!("Retrying vote commit (attempt {attempt}): {err}");
                attempt += 1;
            }
            result => return Ok(result?),
        }
    }
}

/// Apply every write of a vote inside the session's open transaction.
async fn record_vote(
    session: &mut ClientSession,
    users: &Coll<User>,
    elections: &Coll<Election>,
    new_votes: &Coll<NewVote>,
    vote: &NewVote,
) -> Result<()> {
    // Claim the user's single vote in this election. The filter makes this
    // a no-op if they already hold it.
    let claimed = users
        .update_one_with_session(
            doc! {
                "_id": vote.user_id,
                "voted_elections": { "$ne": vote.election_id },
            },
            doc! {
                "$push": { "voted_elections": vote.election_id },
                "$inc": { "votes_cast": 1 },
            },
            None,
            session,
        )
        .await?;
    if claimed.matched_count == 0 {
        warn!(
            "Duplicate vote by {} in election {}",
            vote.user_id, vote.election_id
        );
        return Err(already_voted());
    }

    let counted = elections
        .update_one_with_session(
            doc! {
                "_id": vote.election_id,
                "candidates._id": vote.candidate_id,
            },
            doc! { "$inc": { "candidates.$.votes": 1, "total_votes": 1 } },
            None,
            session,
        )
        .await?;
    if counted.matched_count == 0 {
        return Err(Error::not_found(format!(
            "Candidate {} in election {}",
            vote.candidate_id, vote.election_id
        )));
    }

    match new_votes.insert_one_with_session(vote, None, session).await {
        Ok(_) => Ok(()),
        Err(err) if is_duplicate_key_error(&err) => {
            warn!(
                "Duplicate vote record for {} in election {}",
                vote.user_id, vote.election_id
            );
            Err(already_voted())
        }
        Err(err) => Err(err.into()),
    }
}
