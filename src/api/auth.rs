use log::{debug, info, warn};
use mongodb::bson::doc;
use rocket::{http::CookieJar, serde::json::Json, Route, State};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::logging::RequestId;
use crate::model::{
    api::auth::{
        refresh_token_hmac, refresh_token_matches, Access, LoginRequest, LoginResponse, Refresh,
        RefreshResponse, Token, REFRESH_TOKEN_COOKIE,
    },
    db::user::{normalize_matric_number, User},
    mongodb::Coll,
    secret::verify_dummy,
};

pub fn routes() -> Vec<Route> {
    routes![login, refresh]
}

/// Identical for every failure mode, so callers can't probe for matric numbers.
fn invalid_credentials() -> Error {
    Error::unauthorized("Invalid credentials")
}

fn invalid_refresh_token() -> Error {
    Error::forbidden("Invalid refresh token")
}

#[post("/auth/login", data = "<credentials>", format = "json")]
pub async fn login(
    request_id: &RequestId,
    credentials: Json<LoginRequest>,
    cookies: &CookieJar<'_>,
    users: Coll<User>,
    config: &State<Config>,
) -> Result<Json<LoginResponse>> {
    let matric_number = normalize_matric_number(&credentials.matric_number);
    let user = users
        .find_one(doc! { "matric_number": &matric_number }, None)
        .await?;

    let user = match user {
        Some(user) if user.verify_password(&credentials.password) => user,
        Some(_) => {
            warn!("{request_id} failed login for {matric_number}: wrong password");
            return Err(invalid_credentials());
        }
        None => {
            // Burn the same time as a real check.
            verify_dummy(&credentials.password);
            warn!("{request_id} failed login for {matric_number}: no such user");
            return Err(invalid_credentials());
        }
    };

    let access_token = Token::<Access>::new(&user).encode(config)?;
    let refresh_token = Token::<Refresh>::new(&user).encode(config)?;

    // Only the latest refresh token is honoured.
    let digest = refresh_token_hmac(&refresh_token, config);
    users
        .update_one(
            user.id.as_doc(),
            doc! { "$set": { "refresh_token_hmac": digest } },
            None,
        )
        .await?;
    cookies.add(Token::<Refresh>::cookie(refresh_token, config));

    info!("{request_id} user {matric_number} logged in as {}", user.role);
    Ok(Json(LoginResponse {
        access_token,
        user: (&user).into(),
    }))
}

#[post("/auth/refresh")]
pub async fn refresh(
    cookies: &CookieJar<'_>,
    users: Coll<User>,
    config: &State<Config>,
) -> Result<Json<RefreshResponse>> {
    let encoded = cookies
        .get(REFRESH_TOKEN_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .ok_or_else(|| Error::unauthorized("No refresh token"))?;

    let token = Token::<Refresh>::decode(&encoded, config).map_err(|e| {
        debug!("Rejected refresh token: {e}");
        invalid_refresh_token()
    })?;

    let user = users
        .find_one(token.user_id().as_doc(), None)
        .await?
        .ok_or_else(invalid_refresh_token)?;

    let matches = user
        .refresh_token_hmac
        .as_deref()
        .map_or(false, |stored| refresh_token_matches(&encoded, stored, config));
    if !matches {
        warn!("Stale refresh token presented for {}", user.matric_number);
        return Err(invalid_refresh_token());
    }

    let access_token = Token::<Access>::new(&user).encode(config)?;
    debug!("Refreshed access token for {}", user.matric_number);
    Ok(Json(RefreshResponse { access_token }))
}
