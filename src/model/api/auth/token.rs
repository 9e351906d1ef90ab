use std::marker::PhantomData;

use chrono::{serde::ts_seconds, DateTime, Duration, Utc};
use data_encoding::HEXLOWER;
use hmac::{Hmac, Mac};
use jsonwebtoken::{errors::Error as JwtError, DecodingKey, EncodingKey, Header, Validation};
use log::debug;
use mongodb::Database;
use rocket::{
    http::{Cookie, SameSite, Status},
    request::{FromRequest, Outcome},
    time::Duration as CookieDuration,
    Request, State,
};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::config::Config;
use crate::error::Error;
use crate::model::{
    api::id::ApiId,
    common::user::Role,
    db::user::User,
    mongodb::{Coll, Id},
};

pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

type HmacSha256 = Hmac<Sha256>;

/// The flavour of a signed token: which secret signs it and how long it lives.
pub trait TokenKind: Send + Sync + 'static {
    fn secret(config: &Config) -> &[u8];
    fn ttl(config: &Config) -> Duration;
}

/// Short-lived token presented as a bearer credential on every request.
pub enum Access {}

impl TokenKind for Access {
    fn secret(config: &Config) -> &[u8] {
        config.access_token_secret()
    }

    fn ttl(config: &Config) -> Duration {
        config.access_token_ttl()
    }
}

/// Long-lived token, kept in a cookie, exchanged for new access tokens.
pub enum Refresh {}

impl TokenKind for Refresh {
    fn secret(config: &Config) -> &[u8] {
        config.refresh_token_secret()
    }

    fn ttl(config: &Config) -> Duration {
        config.refresh_token_ttl()
    }
}

/// A signed statement of a user's identity.
#[derive(Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Token<K> {
    pub id: ApiId,
    #[serde(rename = "rgt")]
    pub role: Role,
    #[serde(skip)]
    phantom: PhantomData<K>,
}

impl<K> Token<K>
where
    K: TokenKind,
{
    /// Create a new [`Token`] for the given user.
    pub fn new(user: &User) -> Self {
        Self {
            id: user.id.into(),
            role: user.role,
            phantom: PhantomData,
        }
    }

    /// Sign this token, valid for the configured lifetime from now.
    pub fn encode(&self, config: &Config) -> Result<String, JwtError> {
        self.encode_until(config, Utc::now() + K::ttl(config))
    }

    pub(crate) fn encode_until(&self, config: &Config, expire_at: DateTime<Utc>) -> Result<String, JwtError> {
        let claims = Claims {
            token: Token::<K> {
                id: self.id,
                role: self.role,
                phantom: PhantomData,
            },
            expire_at,
        };
        jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(K::secret(config)),
        )
    }

    /// Verify the signature and expiry of an encoded token.
    pub fn decode(encoded: &str, config: &Config) -> Result<Self, JwtError> {
        let data = jsonwebtoken::decode::<Claims<K>>(
            encoded,
            &DecodingKey::from_secret(K::secret(config)),
            &Validation::default(),
        )?;
        Ok(data.claims.token)
    }

    /// The user this token identifies.
    pub fn user_id(&self) -> Id {
        self.id.into()
    }
}

impl Token<Refresh> {
    /// Wrap an encoded refresh token in its http-only cookie.
    pub fn cookie(encoded: String, config: &Config) -> Cookie<'static> {
        Cookie::build(REFRESH_TOKEN_COOKIE, encoded)
            .max_age(CookieDuration::seconds(config.refresh_token_ttl().num_seconds()))
            .http_only(true)
            .same_site(SameSite::Strict)
            .secure(config.secure_cookies())
            .path("/")
            .finish()
    }
}

/// Token claims: the token itself plus an expiry datetime.
#[derive(Serialize, Deserialize)]
struct Claims<K> {
    #[serde(flatten, bound = "")]
    token: Token<K>,
    #[serde(rename = "exp", with = "ts_seconds")]
    expire_at: DateTime<Utc>,
}

/// The digest of a refresh token that gets persisted against its user.
pub fn refresh_token_hmac(encoded: &str, config: &Config) -> String {
    let mut hmac =
        HmacSha256::new_from_slice(config.hmac_secret()).expect("HMAC can take key of any size");
    hmac.update(encoded.as_bytes());
    HEXLOWER.encode(&hmac.finalize().into_bytes())
}

/// Constant-time check of a presented refresh token against a stored digest.
pub fn refresh_token_matches(encoded: &str, stored_hmac: &str, config: &Config) -> bool {
    let Ok(stored) = HEXLOWER.decode(stored_hmac.as_bytes()) else {
        return false;
    };
    let mut hmac =
        HmacSha256::new_from_slice(config.hmac_secret()).expect("HMAC can take key of any size");
    hmac.update(encoded.as_bytes());
    hmac.verify_slice(&stored).is_ok()
}

/// The privilege a route demands of the bearer of an [`AuthToken`].
pub trait Rights: Send + Sync + 'static {
    fn permits(role: Role) -> bool;
}

/// Any logged-in user.
pub enum AnyRole {}

impl Rights for AnyRole {
    fn permits(_role: Role) -> bool {
        true
    }
}

/// Administrators only.
pub enum AdminRole {}

impl Rights for AdminRole {
    fn permits(role: Role) -> bool {
        role == Role::Admin
    }
}

/// Request guard for an authenticated user holding rights `R`, taken from the
/// `Authorization: Bearer` access token.
pub struct AuthToken<R = AnyRole> {
    id: Id,
    phantom: PhantomData<R>,
}

impl<R> AuthToken<R> {
    /// The authenticated user's ID.
    pub fn id(&self) -> Id {
        self.id
    }
}

#[rocket::async_trait]
impl<'r, R> FromRequest<'r> for AuthToken<R>
where
    R: Rights,
{
    type Error = Error;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        // Unwrap is safe as `Config` is always managed.
        let config = req.guard::<&State<Config>>().await.unwrap();

        let bearer = req
            .headers()
            .get_one("Authorization")
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|value| !value.is_empty());
        let Some(bearer) = bearer else {
            return Outcome::Failure((Status::Unauthorized, Error::unauthorized("Unauthorized")));
        };

        let token = match Token::<Access>::decode(bearer, config) {
            Ok(token) => token,
            Err(e) => {
                debug!("Rejected access token: {e}");
                return Outcome::Failure((Status::Unauthorized, Error::unauthorized("Unauthorized")));
            }
        };

        // Check the user still exists, and take their role from the database
        // rather than the token so that demotions apply immediately.
        let db = req.guard::<&State<Database>>().await.unwrap();
        let user = match Coll::<User>::from_db(db)
            .find_one(token.user_id().as_doc(), None)
            .await
        {
            Ok(Some(user)) => user,
            Ok(None) => {
                return Outcome::Failure((Status::Unauthorized, Error::unauthorized("Unauthorized")))
            }
            Err(e) => return Outcome::Failure((Status::InternalServerError, e.into())),
        };

        if !R::permits(user.role) {
            return Outcome::Failure((Status::Forbidden, Error::forbidden("Insufficient privileges")));
        }

        Outcome::Success(Self {
            id: user.id,
            phantom: PhantomData,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::model::db::user::NewUser;

    fn example_user() -> User {
        User {
            id: Id::new(),
            user: NewUser::example_student(),
        }
    }

    #[test]
    fn access_token_round_trip() {
        let config = Config::example();
        let user = example_user();

        let encoded = Token::<Access>::new(&user).encode(&config).unwrap();
        let decoded = Token::<Access>::decode(&encoded, &config).unwrap();

        assert_eq!(decoded.user_id(), user.id);
        assert_eq!(decoded.role, Role::Student);
    }

    #[test]
    fn kinds_use_distinct_secrets() {
        let config = Config::example();
        let user = example_user();

        let refresh = Token::<Refresh>::new(&user).encode(&config).unwrap();
        assert!(Token::<Access>::decode(&refresh, &config).is_err());

        let access = Token::<Access>::new(&user).encode(&config).unwrap();
        assert!(Token::<Refresh>::decode(&access, &config).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let config = Config::example();
        let token = Token::<Access>::new(&example_user());

        let encoded = token
            .encode_until(&config, Utc::now() - Duration::hours(1))
            .unwrap();
        assert!(Token::<Access>::decode(&encoded, &config).is_err());
    }

    #[test]
    fn tampered_token_is_rejected() {
        let config = Config::example();
        let encoded = Token::<Access>::new(&example_user())
            .encode(&config)
            .unwrap();
        let mut tampered = encoded.clone();
        tampered.push('x');
        assert!(Token::<Access>::decode(&tampered, &config).is_err());
    }

    #[test]
    fn refresh_digest_matching() {
        let config = Config::example();
        let user = example_user();
        let first = Token::<Refresh>::new(&user).encode(&config).unwrap();
        let stored = refresh_token_hmac(&first, &config);

        assert!(refresh_token_matches(&first, &stored, &config));

        // A validly signed token that isn't the one on record doesn't match.
        let other = Token::<Refresh>::new(&user)
            .encode_until(&config, Utc::now() + Duration::days(2))
            .unwrap();
        assert_ne!(first, other);
        assert!(!refresh_token_matches(&other, &stored, &config));

        assert!(!refresh_token_matches(&first, "not hex", &config));
    }

    #[test]
    fn refresh_cookie_attributes() {
        let config = Config::example();
        let cookie = Token::<Refresh>::cookie("value".into(), &config);
        assert_eq!(cookie.name(), REFRESH_TOKEN_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(
            cookie.max_age(),
            Some(CookieDuration::seconds(config.refresh_token_ttl().num_seconds()))
        );
    }

    #[test]
    fn rights() {
        assert!(AnyRole::permits(Role::Student));
        assert!(AnyRole::permits(Role::Admin));
        assert!(AdminRole::permits(Role::Admin));
        assert!(!AdminRole::permits(Role::Student));
    }
}
