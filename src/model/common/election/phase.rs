use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Phases in the Election lifecycle.
///
/// Never stored: always computed from the election's window and the current time.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElectionPhase {
    /// Not yet started. Positions and candidates may still be edited.
    Upcoming,
    /// Open for voting and self-registration.
    Active,
    /// Voting has closed.
    Completed,
}

impl ElectionPhase {
    /// The phase of an election running from `start` to `end` (both inclusive) at time `now`.
    pub fn at(start: DateTime<Utc>, end: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        if now < start {
            Self::Upcoming
        } else if now <= end {
            Self::Active
        } else {
            Self::Completed
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    #[test]
    fn boundaries_are_inclusive() {
        let start = Utc.with_ymd_and_hms(2025, 2, 1, 9, 0, 0).unwrap();
        let end = start + Duration::hours(8);
        let tick = Duration::milliseconds(1);

        assert_eq!(ElectionPhase::at(start, end, start - tick), ElectionPhase::Upcoming);
        assert_eq!(ElectionPhase::at(start, end, start), ElectionPhase::Active);
        assert_eq!(ElectionPhase::at(start, end, start + Duration::hours(4)), ElectionPhase::Active);
        assert_eq!(ElectionPhase::at(start, end, end), ElectionPhase::Active);
        assert_eq!(ElectionPhase::at(start, end, end + tick), ElectionPhase::Completed);
    }

    #[test]
    fn phase_is_monotonic_in_time() {
        let start = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();
        let end = start + Duration::days(1);
        let mut previous = ElectionPhase::Upcoming;
        let mut now = start - Duration::hours(3);
        while now < end + Duration::hours(3) {
            let phase = ElectionPhase::at(start, end, now);
            let rank = |p: ElectionPhase| p as u8;
            assert!(rank(phase) >= rank(previous));
            previous = phase;
            now += Duration::minutes(30);
        }
        assert_eq!(previous, ElectionPhase::Completed);
    }
}
