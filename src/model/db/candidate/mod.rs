use std::ops::{Deref, DerefMut};

use serde::{Deserialize, Serialize};

use crate::model::{common::identity::Degree, mongodb::Id};

mod registry;

pub use registry::CandidacyRegistry;

/// A candidacy for a single position.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct CandidateCore {
    /// Denormalised from the position so uniqueness can be indexed per election.
    pub election_id: Id,
    pub position_id: Id,
    pub name: String,
    /// Normalised to upper case.
    pub roll_no: String,
    pub branch: Option<String>,
    pub degree: Option<Degree>,
    /// Link to a photo hosted elsewhere.
    pub photo: Option<String>,
    /// Only approved candidates are visible to voters and can receive votes.
    pub approved: bool,
    /// The user who filed this candidacy.
    pub registered_by: String,
}

/// A candidate without an ID.
pub type NewCandidate = CandidateCore;

/// A candidate from the database, with its unique ID.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub candidate: CandidateCore,
}

impl Deref for Candidate {
    type Target = CandidateCore;

    fn deref(&self) -> &Self::Target {
        &self.candidate
    }
}

impl DerefMut for Candidate {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.candidate
    }
}

/// Normalise a roll number for storage and comparison.
pub fn normalise_roll_no(roll_no: &str) -> String {
    roll_no.trim().to_uppercase()
}

#[cfg(test)]
pub(crate) mod examples {
    use super::*;

    use crate::model::db::position::Position;

    impl CandidateCore {
        pub fn example(position: &Position, name: &str, roll_no: &str) -> Self {
            Self {
                election_id: position.election_id,
                position_id: position.id,
                name: name.to_string(),
                roll_no: normalise_roll_no(roll_no),
                branch: Some("CSE".to_string()),
                degree: Some(Degree::BTech),
                photo: None,
                approved: true,
                registered_by: "organizer-1".to_string(),
            }
        }
    }
}
