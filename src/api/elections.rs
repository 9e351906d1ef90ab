use chrono::Utc;
use log::{info, warn};
use mongodb::{bson::doc, options::FindOptions};
use rocket::{futures::TryStreamExt, http::Status, serde::json::Json, Route};

use crate::error::{Error, Result};
use crate::model::{
    api::{
        auth::{AdminRole, AuthToken},
        election::{ElectionDescription, ElectionResults, ElectionSpec, PasscodeRequest},
    },
    common::election::ElectionStatus,
    db::election::{Election, NewElection},
    mongodb::{Coll, Id},
};

pub fn routes() -> Vec<Route> {
    routes![
        create_election,
        active_elections,
        completed_elections,
        get_election,
        check_passcode,
    ]
}

#[post("/elections", data = "<spec>", format = "json")]
pub async fn create_election(
    token: AuthToken<AdminRole>,
    spec: Json<ElectionSpec>,
    new_elections: Coll<NewElection>,
    elections: Coll<Election>,
) -> Result<Json<ElectionDescription>> {
    spec.validate()
        .map_err(|e| Error::bad_request(e.to_string()))?;

    let election = spec.0.into_election(Utc::now())?;
    let id: Id = new_elections
        .insert_one(&election, None)
        .await?
        .inserted_id
        .as_object_id()
        .ok_or_else(|| Error::Status(Status::InternalServerError, "Bad inserted ID".into()))?
        .into();

    let election = elections
        .find_one(id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {id}")))?;
    info!(
        "Election {id} '{}' created by {}, status {:?}",
        election.title,
        token.id(),
        election.status
    );
    Ok(Json(election.into()))
}

#[get("/elections")]
async fn active_elections(elections: Coll<Election>) -> Result<Json<Vec<ElectionDescription>>> {
    let now = Utc::now();
    Election::sweep(&elections, now).await?;

    let options = FindOptions::builder().sort(doc! { "end_time": 1 }).build();
    let active = elections
        .find(Election::active_filter(now), options)
        .await?
        .map_ok(ElectionDescription::from)
        .try_collect()
        .await?;
    Ok(Json(active))
}

#[get("/elections/completed")]
async fn completed_elections(elections: Coll<Election>) -> Result<Json<Vec<ElectionResults>>> {
    Election::sweep(&elections, Utc::now()).await?;

    let options = FindOptions::builder().sort(doc! { "end_time": -1 }).build();
    let results = elections
        .find(doc! { "status": ElectionStatus::Completed }, options)
        .await?
        .map_ok(ElectionResults::from)
        .try_collect()
        .await?;
    Ok(Json(results))
}

#[get("/elections/<election_id>", rank = 2)]
async fn get_election(
    election_id: Id,
    elections: Coll<Election>,
) -> Result<Json<ElectionDescription>> {
    Election::sweep(&elections, Utc::now()).await?;

    let election = elections
        .find_one(election_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {election_id}")))?;
    Ok(Json(election.into()))
}

#[post("/elections/<election_id>/passcode", data = "<request>", format = "json")]
async fn check_passcode(
    election_id: Id,
    request: Json<PasscodeRequest>,
    elections: Coll<Election>,
) -> Result<Status> {
    let election = elections
        .find_one(election_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {election_id}")))?;

    if election.verify_passcode(Some(&request.passcode)) {
        Ok(Status::NoContent)
    } else {
        warn!("Wrong passcode offered for election {election_id}");
        Err(Error::forbidden("Incorrect passcode"))
    }
}
