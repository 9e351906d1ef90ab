use chrono::Duration;
use log::{error, info};
use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::model::{
    db::user::ensure_admin_exists,
    mongodb::{ensure_indexes_exist, Coll},
};

/// Name of the production database.
pub const DATABASE_NAME: &str = "univote";

fn default_access_token_ttl() -> u32 {
    15 * 60
}

fn default_refresh_token_ttl() -> u32 {
    7 * 24 * 60 * 60
}

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    #[serde(default = "default_access_token_ttl")]
    access_token_ttl: u32,
    #[serde(default = "default_refresh_token_ttl")]
    refresh_token_ttl: u32,
    #[serde(default)]
    secure_cookies: bool,
    // secrets
    access_token_secret: String,
    refresh_token_secret: String,
    hmac_secret: String,
}

impl Config {
    /// Valid lifetime of access tokens.
    pub fn access_token_ttl(&self) -> Duration {
        Duration::seconds(self.access_token_ttl.into())
    }

    /// Valid lifetime of refresh tokens and their cookie.
    pub fn refresh_token_ttl(&self) -> Duration {
        Duration::seconds(self.refresh_token_ttl.into())
    }

    /// Should the refresh cookie be marked `Secure`?
    pub fn secure_cookies(&self) -> bool {
        self.secure_cookies
    }

    /// Secret key used to sign access tokens.
    pub fn access_token_secret(&self) -> &[u8] {
        self.access_token_secret.as_bytes()
    }

    /// Secret key used to sign refresh tokens.
    pub fn refresh_token_secret(&self) -> &[u8] {
        self.refresh_token_secret.as_bytes()
    }

    /// Secret key used to sign stored refresh token digests.
    pub fn hmac_secret(&self) -> &[u8] {
        self.hmac_secret.as_bytes()
    }
}

/// A fairing that loads the application config and puts it in managed state.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        if config.access_token_secret == config.refresh_token_secret {
            error!("Access and refresh tokens must be signed with different secrets");
            return Err(rocket);
        }

        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// Configuration for the database.
#[derive(Deserialize)]
struct DbConfig {
    // secrets
    db_uri: String,
    admin_matric_number: Option<String>,
    admin_password: Option<String>,
}

impl DbConfig {
    fn admin_credentials(&self) -> Option<(&str, &str)> {
        Some((
            self.admin_matric_number.as_deref()?,
            self.admin_password.as_deref()?,
        ))
    }
}

/// A fairing that loads the MongoDB config, connects to the database,
/// performs any setup necessary, and places both a `Client` and a `Database`
/// into managed state.
pub struct DatabaseFairing;

#[rocket::async_trait]
impl Fairing for DatabaseFairing {
    fn info(&self) -> Info {
        Info {
            name: "MongoDB",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<DbConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load database config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        info!("Loaded database config, connecting...");
        let client = match MongoClient::with_uri_str(&config.db_uri).await {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to connect to database: {e}");
                return Err(rocket);
            }
        };
        let db = client.database(&get_database_name());

        if let Err(e) = ensure_indexes_exist(&db).await {
            error!("Failed to create indexes: {e}");
            return Err(rocket);
        }

        let users = Coll::from_db(&db);
        if let Err(e) = ensure_admin_exists(&users, config.admin_credentials()).await {
            error!("Failed to bootstrap admin account: {e}");
            return Err(rocket);
        }
        info!("...database connection online!");

        rocket = rocket.manage(client).manage(db);
        Ok(rocket)
    }
}

/// Get the name of the database to use (production version).
#[cfg(not(test))]
pub fn get_database_name() -> String {
    DATABASE_NAME.to_string()
}

/// Get the name of the database to use (test version).
/// Use a random name to avoid collisions between tests.
#[cfg(test)]
pub fn get_database_name() -> String {
    let random: u32 = rand::random();
    let db = format!("test{random}");
    info!("Using database {db}");
    db
}
