use serde::{Deserialize, Serialize};

use crate::model::{api::id::ApiId, common::user::Role, db::user::User};

/// Raw login credentials, received from a user. The password is never stored.
#[derive(Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub matric_number: String,
    pub password: String,
}

/// Successful login: a fresh access token plus who it belongs to.
/// The refresh token travels separately, in an http-only cookie.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub user: UserSummary,
}

/// The minimum a client needs to know about the logged-in user.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: ApiId,
    pub role: Role,
    pub matric_number: String,
    pub name: String,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.into(),
            role: user.role,
            matric_number: user.matric_number.clone(),
            name: user.name.clone(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub access_token: String,
}
