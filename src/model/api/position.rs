use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    api::{candidate::CandidateDescription, id::ApiId},
    common::{election::RestrictionSet, identity::VoterIdentity},
    db::position::{NewPosition, Position},
    mongodb::Id,
};

fn default_max_votes() -> u32 {
    1
}

/// A position specification, as submitted by an organizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionSpec {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(flatten)]
    pub restrictions: RestrictionSet,
    #[serde(default = "default_max_votes")]
    pub max_votes_per_voter: u32,
    #[serde(default)]
    pub max_candidates: Option<u32>,
}

impl PositionSpec {
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::BadRequest("position title is empty".to_string()));
        }
        if self.max_votes_per_voter < 1 {
            return Err(Error::BadRequest(
                "max_votes_per_voter must be at least 1".to_string(),
            ));
        }
        if self.max_candidates == Some(0) {
            return Err(Error::BadRequest("max_candidates must be at least 1".to_string()));
        }
        Ok(())
    }

    pub fn into_position(self, election_id: Id) -> NewPosition {
        NewPosition {
            election_id,
            title: self.title.trim().to_string(),
            description: self.description,
            restrictions: self.restrictions,
            max_votes_per_voter: self.max_votes_per_voter,
            max_candidates: self.max_candidates,
        }
    }
}

/// A position together with its visible candidates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionDescription {
    pub id: ApiId,
    pub election_id: ApiId,
    pub title: String,
    pub description: String,
    #[serde(flatten)]
    pub restrictions: RestrictionSet,
    pub max_votes_per_voter: u32,
    pub max_candidates: Option<u32>,
    pub candidates: Vec<CandidateDescription>,
}

impl PositionDescription {
    pub fn new(position: Position, candidates: Vec<CandidateDescription>) -> Self {
        Self {
            id: position.id.into(),
            election_id: position.election_id.into(),
            title: position.position.title,
            description: position.position.description,
            restrictions: position.position.restrictions,
            max_votes_per_voter: position.position.max_votes_per_voter,
            max_candidates: position.position.max_candidates,
            candidates,
        }
    }
}

/// A position the caller may vote for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligiblePosition {
    #[serde(flatten)]
    pub position: PositionDescription,
    /// Votes the caller has not yet used for this position.
    pub votes_remaining: u32,
}

/// Everything a voter needs to fill in their ballot for one election.
#[derive(Debug, Clone, Serialize)]
pub struct EligibleBallot {
    pub voter: VoterIdentity,
    pub positions: Vec<EligiblePosition>,
}

#[cfg(test)]
mod tests {
    use rocket::serde::json::serde_json;

    use super::*;

    #[test]
    fn allowance_defaults_to_one() {
        let json = r#"{"title": "General Secretary", "branch_restriction": ["CSE"]}"#;
        let spec: PositionSpec = serde_json::from_str(json).unwrap();
        assert!(spec.validate().is_ok());
        assert_eq!(spec.max_votes_per_voter, 1);
        assert_eq!(spec.max_candidates, None);
        assert_eq!(spec.restrictions.branch_restriction, vec!["CSE".to_string()]);
        assert!(spec.restrictions.batch_restriction.is_empty());
    }

    #[test]
    fn zero_allowance_is_rejected() {
        let json = r#"{"title": "Senator", "max_votes_per_voter": 0}"#;
        let spec: PositionSpec = serde_json::from_str(json).unwrap();
        assert!(matches!(spec.validate(), Err(Error::BadRequest(_))));
    }

    #[test]
    fn candidate_cap_must_admit_someone() {
        let json = r#"{"title": "Senator", "max_candidates": 0}"#;
        let spec: PositionSpec = serde_json::from_str(json).unwrap();
        assert!(matches!(spec.validate(), Err(Error::BadRequest(_))));

        let json = r#"{"title": "Senator", "max_candidates": 3}"#;
        let spec: PositionSpec = serde_json::from_str(json).unwrap();
        assert!(spec.validate().is_ok());
        assert_eq!(spec.into_position(Id::new()).max_candidates, Some(3));
    }
}
