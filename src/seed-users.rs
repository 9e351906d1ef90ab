//! A CLI tool for seeding student accounts into the election database.

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use mongodb::Client;
use rand::{seq::index::sample, seq::SliceRandom, Rng};

use univote_backend::config::DATABASE_NAME;
use univote_backend::model::{
    common::user::Role,
    db::user::NewUser,
    mongodb::{ensure_indexes_exist, is_duplicate_key_error, Coll},
    secret::MIN_PASSWORD_LENGTH,
};

const PROGRAM_NAME: &str = "seed-users";

const ABOUT_TEXT: &str = "Insert student accounts with random matric numbers.

Every account gets the same password. Matric numbers already in use are skipped.";

const COUNT: &str = "COUNT";
const PASSWORD: &str = "PASSWORD";
const PREFIX: &str = "PREFIX";
const DB_URI: &str = "DB_URI";

const DEFAULT_PREFIX: &str = "SAZUG/UG/SCI/CSC";

/// Matric numbers end in a four digit serial, from 1000 to 9999.
const FIRST_SERIAL: usize = 1000;
const SERIALS: usize = 9000;

const FIRST_NAMES: &[&str] = &[
    "Ada", "Bola", "Chidi", "Dayo", "Emeka", "Funmi", "Gbenga", "Halima", "Ifeoma", "Jide",
    "Kemi", "Lanre", "Musa", "Ngozi", "Ore", "Segun", "Tunde", "Uche", "Yetunde", "Zainab",
];

const LAST_NAMES: &[&str] = &[
    "Adeyemi", "Bello", "Chukwu", "Danjuma", "Eze", "Okafor", "Olawale", "Nwosu", "Obi",
    "Usman",
];

/// Construct the CLI configuration.
fn cli() -> Command {
    // Make the build dirty when the toml changes.
    include_str!("../Cargo.toml");

    clap::command!(PROGRAM_NAME)
        .about(ABOUT_TEXT)
        .arg(
            Arg::new(COUNT)
                .help("How many accounts to create")
                .value_parser(value_parser!(usize))
                .action(ArgAction::Set)
                .required(true),
        )
        .arg(
            Arg::new(PASSWORD)
                .help("Password for every created account")
                .long("password")
                .short('p')
                .action(ArgAction::Set)
                .required(true),
        )
        .arg(
            Arg::new(PREFIX)
                .help("Matric number prefix, before the four digit serial")
                .long("prefix")
                .action(ArgAction::Set)
                .default_value(DEFAULT_PREFIX),
        )
        .arg(
            Arg::new(DB_URI)
                .help("MongoDB connection string")
                .long("db-uri")
                .env("ROCKET_DB_URI")
                .action(ArgAction::Set)
                .default_value("mongodb://localhost:27017/?replicaSet=rs0&directConnection=true"),
        )
}

/// `count` distinct matric numbers under `prefix`.
fn matric_numbers(prefix: &str, count: usize, rng: &mut impl Rng) -> Vec<String> {
    sample(rng, SERIALS, count)
        .into_iter()
        .map(|offset| format!("{prefix}/{}", FIRST_SERIAL + offset))
        .collect()
}

/// A plausible `(name, email)` for the account with the given matric number.
fn identity(matric_number: &str, rng: &mut impl Rng) -> (String, String) {
    // Slices are non-empty constants.
    let first = FIRST_NAMES.choose(rng).unwrap_or(&"Student");
    let last = LAST_NAMES.choose(rng).unwrap_or(&"Example");
    let serial = matric_number.rsplit('/').next().unwrap_or_default();
    let email = format!(
        "{}.{}{serial}@students.example.edu",
        first.to_lowercase(),
        last.to_lowercase()
    );
    (format!("{first} {last}"), email)
}

/// Build the accounts to insert, hashing the shared password for each.
fn accounts(prefix: &str, count: usize, password: &str) -> Result<Vec<NewUser>, String> {
    if count > SERIALS {
        return Err(format!("At most {SERIALS} accounts fit under one prefix"));
    }
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        ));
    }

    let mut rng = rand::thread_rng();
    matric_numbers(prefix, count, &mut rng)
        .into_iter()
        .map(|matric_number| {
            let (name, email) = identity(&matric_number, &mut rng);
            NewUser::new(&matric_number, name, email, password, Role::Student)
                .map_err(|e| format!("Failed to hash password: {e}"))
        })
        .collect()
}

/// Seed the database, report what happened, and return the exit code.
async fn run(args: &ArgMatches) -> u8 {
    // Required or defaulted arguments are guaranteed to be present.
    let count: usize = *args.get_one(COUNT).unwrap();
    let password: &String = args.get_one(PASSWORD).unwrap();
    let prefix: &String = args.get_one(PREFIX).unwrap();
    let db_uri: &String = args.get_one(DB_URI).unwrap();

    let accounts = match accounts(prefix, count, password) {
        Ok(accounts) => accounts,
        Err(msg) => {
            println!("{msg}");
            return 2;
        }
    };

    let client = match Client::with_uri_str(db_uri).await {
        Ok(client) => client,
        Err(e) => {
            println!("Failed to connect to database: {e}");
            return 1;
        }
    };
    let db = client.database(DATABASE_NAME);
    if let Err(e) = ensure_indexes_exist(&db).await {
        println!("Failed to create indexes: {e}");
        return 1;
    }

    let users = Coll::<NewUser>::from_db(&db);
    let mut created = 0;
    for account in accounts {
        match users.insert_one(&account, None).await {
            Ok(_) => {
                println!("Created {} ({})", account.matric_number, account.name);
                created += 1;
            }
            Err(e) if is_duplicate_key_error(&e) => {
                println!("Skipped {}: already exists", account.matric_number);
            }
            Err(e) => {
                println!("Failed to insert {}: {e}", account.matric_number);
                return 1;
            }
        }
    }
    println!("Created {created} of {count} accounts.");
    0
}

#[rocket::main]
async fn main() {
    let args = cli().get_matches();
    let exit_code = run(&args).await;
    std::process::exit(exit_code.into())
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    #[test]
    fn cli_is_well_formed() {
        cli().debug_assert();
    }

    #[test]
    fn matric_numbers_are_distinct() {
        let mut rng = StdRng::seed_from_u64(7);
        let numbers = matric_numbers(DEFAULT_PREFIX, 500, &mut rng);
        assert_eq!(numbers.len(), 500);
        assert_eq!(numbers.iter().collect::<HashSet<_>>().len(), 500);
        for number in numbers {
            let serial = number.strip_prefix("SAZUG/UG/SCI/CSC/").unwrap();
            let serial: usize = serial.parse().unwrap();
            assert!((1000..=9999).contains(&serial));
        }
    }

    #[test]
    fn identities_use_the_serial() {
        let mut rng = StdRng::seed_from_u64(7);
        let (name, email) = identity("SAZUG/UG/SCI/CSC/4242", &mut rng);
        assert_eq!(name.split(' ').count(), 2);
        assert!(email.ends_with("4242@students.example.edu"));
        assert_eq!(email, email.to_lowercase());
    }

    #[test]
    fn every_serial_can_be_drawn() {
        let mut rng = StdRng::seed_from_u64(7);
        let numbers = matric_numbers("P", SERIALS, &mut rng);
        assert!(numbers.contains(&"P/1000".to_string()));
        assert!(numbers.contains(&"P/9999".to_string()));
    }

    #[test]
    fn account_limits() {
        assert!(accounts(DEFAULT_PREFIX, SERIALS + 1, "long-enough").is_err());
        assert!(accounts(DEFAULT_PREFIX, 1, "short").is_err());

        let created = accounts("TEST", 2, "long-enough").unwrap();
        assert_eq!(created.len(), 2);
        assert!(created.iter().all(|u| u.role == Role::Student));
        assert!(created.iter().all(|u| u.verify_password("long-enough")));
    }
}
