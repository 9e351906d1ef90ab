use log::info;
use mongodb::{
    bson::doc,
    options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument},
};
use rocket::{futures::TryStreamExt, serde::json::Json, Route};

use crate::error::{Error, Result};
use crate::model::{
    api::{
        auth::AuthToken,
        profile::{ProfileUpdate, ProfileUpdateError, UserProfile},
        vote::VoteRecord,
    },
    db::{user::User, vote::Vote},
    mongodb::Coll,
};

pub fn routes() -> Vec<Route> {
    routes![get_profile, update_profile, get_votes]
}

#[get("/profile")]
async fn get_profile(token: AuthToken, users: Coll<User>) -> Result<Json<UserProfile>> {
    let user = users
        .find_one(token.id().as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("User {}", token.id())))?;
    Ok(Json(user.into()))
}

#[put("/profile", data = "<update>", format = "json")]
async fn update_profile(
    token: AuthToken,
    update: Json<ProfileUpdate>,
    users: Coll<User>,
) -> Result<Json<UserProfile>> {
    let update = update.0.into_update_doc().map_err(|e| match e {
        ProfileUpdateError::Hash(e) => Error::Argon2(e),
        e => Error::bad_request(e.to_string()),
    })?;
    let not_found = || Error::not_found(format!("User {}", token.id()));

    let user = match update {
        Some(update) => {
            let options = FindOneAndUpdateOptions::builder()
                .return_document(ReturnDocument::After)
                .build();
            let user = users
                .find_one_and_update(token.id().as_doc(), update, options)
                .await?
                .ok_or_else(not_found)?;
            info!("User {} updated their profile", user.matric_number);
            user
        }
        None => users
            .find_one(token.id().as_doc(), None)
            .await?
            .ok_or_else(not_found)?,
    };
    Ok(Json(user.into()))
}

#[get("/profile/votes")]
async fn get_votes(token: AuthToken, votes: Coll<Vote>) -> Result<Json<Vec<VoteRecord>>> {
    let options = FindOptions::builder().sort(doc! { "cast_at": -1 }).build();
    let records = votes
        .find(doc! { "user_id": token.id() }, options)
        .await?
        .map_ok(VoteRecord::from)
        .try_collect()
        .await?;
    Ok(Json(records))
}
