use chrono::{DateTime, Utc};
use mongodb::bson::{to_bson, Bson};
use serde::{Deserialize, Serialize};

/// States in the election lifecycle.
///
/// The declaration order is the lifecycle order, so `Ord` can be used to
/// guarantee an election never moves backwards.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElectionStatus {
    /// Voting has not opened yet.
    Upcoming,
    /// Voting is open.
    Ongoing,
    /// Voting has closed; results are final.
    Completed,
}

impl ElectionStatus {
    /// The status an election with the given window has at time `now`.
    ///
    /// Both ends of the window are inclusive.
    pub fn derive(now: DateTime<Utc>, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        if now < start {
            Self::Upcoming
        } else if now <= end {
            Self::Ongoing
        } else {
            Self::Completed
        }
    }

    /// Combine a previously persisted status with a freshly derived one.
    /// The result is never earlier in the lifecycle than `self`.
    pub fn advance(self, derived: Self) -> Self {
        self.max(derived)
    }
}

impl From<ElectionStatus> for Bson {
    fn from(status: ElectionStatus) -> Self {
        to_bson(&status).expect("Serialisation is infallible")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration;

    #[test]
    fn derive_follows_the_window() {
        let now = Utc::now();
        let hour = Duration::hours(1);

        assert_eq!(
            ElectionStatus::derive(now, now + hour, now + hour * 2),
            ElectionStatus::Upcoming
        );
        assert_eq!(
            ElectionStatus::derive(now, now - hour, now + hour),
            ElectionStatus::Ongoing
        );
        assert_eq!(
            ElectionStatus::derive(now, now - hour * 2, now - hour),
            ElectionStatus::Completed
        );
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let now = Utc::now();
        let later = now + Duration::minutes(5);
        assert_eq!(ElectionStatus::derive(now, now, later), ElectionStatus::Ongoing);
        assert_eq!(ElectionStatus::derive(later, now, later), ElectionStatus::Ongoing);
        assert_eq!(
            ElectionStatus::derive(later + Duration::milliseconds(1), now, later),
            ElectionStatus::Completed
        );
    }

    #[test]
    fn advance_never_reverts() {
        use ElectionStatus::*;

        assert_eq!(Completed.advance(Ongoing), Completed);
        assert_eq!(Completed.advance(Upcoming), Completed);
        assert_eq!(Ongoing.advance(Upcoming), Ongoing);
        assert_eq!(Upcoming.advance(Ongoing), Ongoing);
        assert_eq!(Ongoing.advance(Completed), Completed);
    }

    #[test]
    fn serialises_lowercase() {
        assert_eq!(Bson::from(ElectionStatus::Ongoing), Bson::String("ongoing".into()));
        assert_eq!(
            rocket::serde::json::to_string(&ElectionStatus::Completed).unwrap(),
            "\"completed\""
        );
    }
}
