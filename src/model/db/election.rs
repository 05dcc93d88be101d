use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{common::election::ElectionPhase, mongodb::Id};

/// Core election data, as stored in the database.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct ElectionCore {
    /// Election title.
    pub title: String,
    /// Free-form description.
    pub description: String,
    /// Voting opens.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub start_time: DateTime<Utc>,
    /// Voting closes.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub end_time: DateTime<Utc>,
    /// The organizer who created this election.
    pub created_by: String,
    /// Whether results may be read before the election completes.
    pub display_results: bool,
    /// Whether voters can see this election at all.
    pub display_election: bool,
}

impl ElectionCore {
    /// The phase this election is in at the given time.
    pub fn phase_at(&self, now: DateTime<Utc>) -> ElectionPhase {
        ElectionPhase::at(self.start_time, self.end_time, now)
    }

    /// The phase this election is in right now.
    pub fn phase(&self) -> ElectionPhase {
        self.phase_at(Utc::now())
    }

    /// Whether results may be shown to voters right now.
    pub fn results_visible(&self) -> bool {
        self.display_results || self.phase() == ElectionPhase::Completed
    }
}

/// An election without an ID.
pub type NewElection = ElectionCore;

/// An election from the database, with its unique ID.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Election {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub election: ElectionCore,
}

impl Deref for Election {
    type Target = ElectionCore;

    fn deref(&self) -> &Self::Target {
        &self.election
    }
}

impl DerefMut for Election {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.election
    }
}
