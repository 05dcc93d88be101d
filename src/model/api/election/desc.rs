use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{
    api::{id::ApiId, position::PositionDescription},
    common::election::ElectionPhase,
    db::{election::Election, stats::ElectionCounts},
};

/// A summary of an election, with its phase computed at the time of the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionSummary {
    /// Election unique ID.
    pub id: ApiId,
    pub title: String,
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub display_results: bool,
    pub display_election: bool,
    /// Election phase right now.
    pub phase: ElectionPhase,
    pub is_active: bool,
    pub is_upcoming: bool,
    pub is_completed: bool,
    /// Whether the caller has voted in this election.
    pub has_voted: bool,
    pub candidates_count: u64,
    pub votes_count: u64,
}

impl ElectionSummary {
    pub fn new(
        election: Election,
        has_voted: bool,
        counts: ElectionCounts,
        now: DateTime<Utc>,
    ) -> Self {
        let phase = election.phase_at(now);
        Self {
            id: election.id.into(),
            title: election.election.title,
            description: election.election.description,
            start_time: election.election.start_time,
            end_time: election.election.end_time,
            display_results: election.election.display_results,
            display_election: election.election.display_election,
            phase,
            is_active: phase == ElectionPhase::Active,
            is_upcoming: phase == ElectionPhase::Upcoming,
            is_completed: phase == ElectionPhase::Completed,
            has_voted,
            candidates_count: counts.candidates_count,
            votes_count: counts.votes_count,
        }
    }
}

/// A full election description: the summary plus its positions and candidates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionDescription {
    #[serde(flatten)]
    pub summary: ElectionSummary,
    pub positions: Vec<PositionDescription>,
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::model::{db::election::NewElection, mongodb::Id};

    #[test]
    fn computed_phase_flags() {
        let election = Election {
            id: Id::new(),
            election: NewElection::future_example(),
        };
        let start = election.start_time;
        let counts = ElectionCounts {
            candidates_count: 4,
            votes_count: 9,
        };

        let summary = ElectionSummary::new(election.clone(), false, counts, start - Duration::seconds(1));
        assert_eq!(summary.phase, ElectionPhase::Upcoming);
        assert!(summary.is_upcoming && !summary.is_active && !summary.is_completed);

        let summary = ElectionSummary::new(election.clone(), true, counts, start);
        assert_eq!(summary.phase, ElectionPhase::Active);
        assert!(summary.is_active && !summary.is_upcoming && !summary.is_completed);
        assert!(summary.has_voted);
        assert_eq!((summary.candidates_count, summary.votes_count), (4, 9));

        let summary = ElectionSummary::new(
            election.clone(),
            false,
            counts,
            election.end_time + Duration::seconds(1),
        );
        assert!(summary.is_completed && !summary.is_active && !summary.is_upcoming);
    }
}
