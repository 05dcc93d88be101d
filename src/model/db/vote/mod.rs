use std::ops::Deref;

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

mod ledger;

pub use ledger::{next_slot, BatchOutcome, VoteLedger};

/// A single vote. Immutable once written.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct VoteCore {
    /// The `sub` of the voter's auth token.
    pub voter_id: String,
    pub election_id: Id,
    pub position_id: Id,
    pub candidate_id: Id,
    /// Which of the voter's allowance slots for this position this vote occupies.
    pub slot: u32,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub timestamp: DateTime<Utc>,
}

/// A vote without an ID.
pub type NewVote = VoteCore;

/// A vote from the database, with its unique ID.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Vote {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub vote: VoteCore,
}

impl Deref for Vote {
    type Target = VoteCore;

    fn deref(&self) -> &Self::Target {
        &self.vote
    }
}
