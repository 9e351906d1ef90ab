use chrono::{DateTime, Utc};
use mongodb::bson::{doc, Document};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::id::ApiId,
    common::user::Role,
    db::user::User,
    secret::{hash_secret, MIN_PASSWORD_LENGTH},
};

/// A user's own view of their account. Credentials are never included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: ApiId,
    pub matric_number: String,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub role: Role,
    pub votes_cast: u32,
    pub voted_elections: Vec<ApiId>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        let id = user.id.into();
        let user = user.user;
        Self {
            id,
            matric_number: user.matric_number,
            name: user.name,
            email: user.email,
            avatar: user.avatar,
            role: user.role,
            votes_cast: user.votes_cast,
            voted_elections: user.voted_elections.into_iter().map(Into::into).collect(),
            created_at: user.created_at,
        }
    }
}

/// The fields a user may change about themselves. Absent fields are left alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub avatar: Option<String>,
    pub password: Option<String>,
}

/// Why a [`ProfileUpdate`] could not be applied.
#[derive(Debug, thiserror::Error)]
pub enum ProfileUpdateError {
    #[error("Password must be at least {MIN_PASSWORD_LENGTH} characters")]
    PasswordTooShort,
    #[error("Name cannot be empty")]
    EmptyName,
    #[error(transparent)]
    Hash(#[from] argon2::Error),
}

impl ProfileUpdate {
    /// Build the update document for this update, hashing any new password.
    /// A new password also revokes the outstanding refresh token.
    /// Returns `None` if nothing would change.
    pub fn into_update_doc(self) -> Result<Option<Document>, ProfileUpdateError> {
        let mut set = Document::new();
        if let Some(name) = self.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(ProfileUpdateError::EmptyName);
            }
            set.insert("name", name);
        }
        if let Some(email) = self.email {
            set.insert("email", email.trim());
        }
        if let Some(avatar) = self.avatar {
            set.insert("avatar", avatar);
        }
        if let Some(password) = self.password {
            if password.chars().count() < MIN_PASSWORD_LENGTH {
                return Err(ProfileUpdateError::PasswordTooShort);
            }
            set.insert("password_hash", hash_secret(&password)?);
            return Ok(Some(doc! {
                "$set": set,
                "$unset": { "refresh_token_hmac": "" },
            }));
        }

        Ok((!set.is_empty()).then(|| doc! { "$set": set }))
    }
}
