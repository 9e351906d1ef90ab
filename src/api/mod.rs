use rocket::Route;

pub(crate) mod auth;
pub(crate) mod elections;
pub(crate) mod profile;
pub(crate) mod voting;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(auth::routes());
    routes.extend(profile::routes());
    routes.extend(elections::routes());
    routes.extend(voting::routes());
    routes
}

/// Shared helpers for the route tests.
#[cfg(test)]
pub(crate) mod testing {
    use mongodb::Database;
    use rocket::{
        http::{ContentType, Header, Status},
        local::asynchronous::Client,
        serde::json::json,
    };

    use crate::model::{
        api::{
            auth::{LoginRequest, LoginResponse},
            election::{ElectionDescription, ElectionSpec},
        },
        db::user::NewUser,
        mongodb::{Coll, Id},
    };

    /// Insert a user directly into the database, returning their ID.
    pub async fn insert_user(db: &Database, user: NewUser) -> Id {
        Coll::<NewUser>::from_db(db)
            .insert_one(user, None)
            .await
            .unwrap()
            .inserted_id
            .as_object_id()
            .unwrap()
            .into()
    }

    /// Log in, asserting success.
    pub async fn login(client: &Client, credentials: &LoginRequest) -> LoginResponse {
        let response = client
            .post(uri!(crate::api::auth::login))
            .header(ContentType::JSON)
            .body(json!(credentials).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        response.into_json().await.unwrap()
    }

    /// Insert the example student and log them in, returning their access token.
    pub async fn student_token(client: &Client, db: &Database) -> String {
        insert_user(db, NewUser::example_student()).await;
        login(client, &LoginRequest::example_student())
            .await
            .access_token
    }

    /// Insert the example admin and log them in, returning their access token.
    pub async fn admin_token(client: &Client, db: &Database) -> String {
        insert_user(db, NewUser::example_admin()).await;
        login(client, &LoginRequest::example_admin())
            .await
            .access_token
    }

    pub fn bearer(token: &str) -> Header<'static> {
        Header::new("Authorization", format!("Bearer {token}"))
    }

    /// Create an election through the API, asserting success.
    pub async fn create_election(
        client: &Client,
        admin_token: &str,
        spec: &ElectionSpec,
    ) -> ElectionDescription {
        let response = client
            .post(uri!(crate::api::elections::create_election))
            .header(ContentType::JSON)
            .header(bearer(admin_token))
            .body(json!(spec).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::Ok, response.status());
        response.into_json().await.unwrap()
    }
}
