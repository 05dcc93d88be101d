use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::{common::election::RestrictionSet, mongodb::Id};

/// A single electable office within an election.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct PositionCore {
    /// The owning election.
    pub election_id: Id,
    pub title: String,
    pub description: String,
    /// Who may vote for this position.
    #[serde(flatten)]
    pub restrictions: RestrictionSet,
    /// How many different candidates one voter may vote for. At least one.
    pub max_votes_per_voter: u32,
    /// Cap on candidacies, pending ones included. Unlimited when absent.
    #[serde(default)]
    pub max_candidates: Option<u32>,
}

/// A position without an ID.
pub type NewPosition = PositionCore;

/// A position from the database, with its unique ID.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Position {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub position: PositionCore,
}

impl Deref for Position {
    type Target = PositionCore;

    fn deref(&self) -> &Self::Target {
        &self.position
    }
}

impl DerefMut for Position {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.position
    }
}

#[cfg(test)]
pub(crate) mod examples {
    use super::*;

    impl PositionCore {
        pub fn example(election_id: Id, title: &str, restrictions: RestrictionSet) -> Self {
            Self {
                election_id,
                title: title.to_string(),
                description: format!("{title} description"),
                restrictions,
                max_votes_per_voter: 1,
                max_candidates: None,
            }
        }
    }
}
