//! DB-compatible (e.g. de/serialisable) types.
//!
//! The types in this module are serialised in an DB-friendly way, e.g.:
//!
//! - IDs and datetimes are serialised in MongoDB's own format.

pub mod election;
pub mod user;
pub mod vote;

pub use election::{Candidate, Election, NewElection};
pub use user::{NewUser, User};
pub use vote::{NewVote, Vote};
