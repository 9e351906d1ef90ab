use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use log::{info, warn};
use mongodb::bson::{doc, serde_helpers::chrono_datetime_as_bson_datetime};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{
    common::user::Role,
    mongodb::{Coll, Id},
    secret::{hash_secret, verify_secret},
};

/// Core user data, as stored in the database.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct UserCore {
    /// Unique, upper-cased matriculation number.
    pub matric_number: String,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    /// Argon2 encoded password hash.
    pub password_hash: String,
    pub role: Role,
    /// Always equal to `voted_elections.len()`.
    pub votes_cast: u32,
    /// Elections this user has already voted in, in voting order.
    pub voted_elections: Vec<Id>,
    /// HMAC of the most recently issued refresh token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token_hmac: Option<String>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl UserCore {
    /// Create a new user who hasn't voted yet, hashing their password.
    pub fn new(
        matric_number: &str,
        name: String,
        email: String,
        password: &str,
        role: Role,
    ) -> Result<Self, argon2::Error> {
        Ok(Self {
            matric_number: normalize_matric_number(matric_number),
            name,
            email,
            avatar: None,
            password_hash: hash_secret(password)?,
            role,
            votes_cast: 0,
            voted_elections: Vec::new(),
            refresh_token_hmac: None,
            created_at: Utc::now(),
        })
    }

    /// Check whether the given password is correct.
    pub fn verify_password(&self, password: &str) -> bool {
        verify_secret(&self.password_hash, password)
    }
}

/// Matric numbers are compared case-insensitively and without surrounding whitespace.
pub fn normalize_matric_number(matric_number: &str) -> String {
    matric_number.trim().to_uppercase()
}

/// Ensure there is at least one admin account, creating one from the given
/// `(matric_number, password)` if there isn't.
pub async fn ensure_admin_exists(
    users: &Coll<NewUser>,
    credentials: Option<(&str, &str)>,
) -> Result<()> {
    let admins = users
        .count_documents(doc! { "role": Role::Admin }, None)
        .await?;
    if admins > 0 {
        return Ok(());
    }

    match credentials {
        Some((matric_number, password)) => {
            let admin = NewUser::new(
                matric_number,
                "Administrator".to_string(),
                String::new(),
                password,
                Role::Admin,
            )?;
            users.insert_one(&admin, None).await?;
            info!("Created bootstrap admin {}", admin.matric_number);
        }
        None => warn!("No admin account exists and none is configured"),
    }
    Ok(())
}

/// A user without an ID.
pub type NewUser = UserCore;

/// A user from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub user: UserCore,
}

impl Deref for User {
    type Target = UserCore;

    fn deref(&self) -> &Self::Target {
        &self.user
    }
}

impl DerefMut for User {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.user
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    use crate::model::api::auth::LoginRequest;

    impl UserCore {
        pub fn example_student() -> Self {
            let credentials = LoginRequest::example_student();
            Self::new(
                &credentials.matric_number,
                "Ada Obi".to_string(),
                "ada.obi@example.edu".to_string(),
                &credentials.password,
                Role::Student,
            )
            .unwrap()
        }

        pub fn example_student2() -> Self {
            let credentials = LoginRequest::example_student2();
            Self::new(
                &credentials.matric_number,
                "Tunde Bello".to_string(),
                "tunde.bello@example.edu".to_string(),
                &credentials.password,
                Role::Student,
            )
            .unwrap()
        }

        pub fn example_admin() -> Self {
            let credentials = LoginRequest::example_admin();
            Self::new(
                &credentials.matric_number,
                "Electoral Officer".to_string(),
                "elections@example.edu".to_string(),
                &credentials.password,
                Role::Admin,
            )
            .unwrap()
        }
    }
}

#[cfg(test)]
mod tests {
    use backend_test::backend_test;

    use super::*;

    #[test]
    fn matric_numbers_are_normalized() {
        assert_eq!(
            normalize_matric_number("  sazug/ug/sci/csc/1234 "),
            "SAZUG/UG/SCI/CSC/1234"
        );
    }

    #[test]
    fn new_user_hashes_password() {
        let user = NewUser::example_student();
        assert_eq!(user.matric_number, "SAZUG/UG/SCI/CSC/1234");
        assert_ne!(user.password_hash, "87654321");
        assert!(user.verify_password("87654321"));
        assert!(!user.verify_password("12345678"));
        assert_eq!(user.votes_cast, 0);
        assert!(user.voted_elections.is_empty());
    }

    #[backend_test]
    async fn bootstrap_admin_created_once(users: Coll<NewUser>) {
        ensure_admin_exists(&users, Some(("admin/0001", "change-me-now")))
            .await
            .unwrap();
        // A second call with different credentials is a no-op.
        ensure_admin_exists(&users, Some(("ADMIN/0002", "another-password")))
            .await
            .unwrap();

        let admins = users
            .find_one(doc! { "role": Role::Admin }, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(admins.matric_number, "ADMIN/0001");
        assert!(admins.verify_password("change-me-now"));
        assert_eq!(users.count_documents(None, None).await.unwrap(), 1);
    }

    #[backend_test]
    async fn no_admin_configured(users: Coll<NewUser>) {
        ensure_admin_exists(&users, None).await.unwrap();
        assert_eq!(users.count_documents(None, None).await.unwrap(), 0);
    }
}
