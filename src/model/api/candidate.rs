use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    api::id::ApiId,
    common::identity::Degree,
    db::{
        candidate::{normalise_roll_no, Candidate, NewCandidate},
        position::Position,
    },
};

/// A candidacy, as submitted by an organizer or a prospective candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateSpec {
    pub name: String,
    pub roll_no: String,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub degree: Option<Degree>,
    #[serde(default)]
    pub photo: Option<String>,
    /// Only honoured for organizers.
    #[serde(default)]
    pub approved: Option<bool>,
}

impl CandidateSpec {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::BadRequest("candidate name is empty".to_string()));
        }
        if self.roll_no.trim().is_empty() {
            return Err(Error::BadRequest("candidate roll number is empty".to_string()));
        }
        Ok(())
    }

    /// Convert into a candidacy for `position`, filed by `registered_by`.
    pub fn into_candidate(
        self,
        position: &Position,
        approved: bool,
        registered_by: &str,
    ) -> NewCandidate {
        NewCandidate {
            election_id: position.election_id,
            position_id: position.id,
            name: self.name.trim().to_string(),
            roll_no: normalise_roll_no(&self.roll_no),
            branch: self.branch,
            degree: self.degree,
            photo: self.photo,
            approved,
            registered_by: registered_by.to_string(),
        }
    }
}

/// A candidate as shown to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateDescription {
    pub id: ApiId,
    pub position_id: ApiId,
    pub name: String,
    pub roll_no: String,
    pub branch: Option<String>,
    pub degree: Option<Degree>,
    pub photo: Option<String>,
    pub approved: bool,
}

impl From<Candidate> for CandidateDescription {
    fn from(candidate: Candidate) -> Self {
        Self {
            id: candidate.id.into(),
            position_id: candidate.position_id.into(),
            name: candidate.candidate.name,
            roll_no: candidate.candidate.roll_no,
            branch: candidate.candidate.branch,
            degree: candidate.candidate.degree,
            photo: candidate.candidate.photo,
            approved: candidate.candidate.approved,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        common::election::RestrictionSet,
        db::position::NewPosition,
        mongodb::Id,
    };

    #[test]
    fn spec_is_normalised() {
        let position = Position {
            id: Id::new(),
            position: NewPosition::example(Id::new(), "Treasurer", RestrictionSet::default()),
        };
        let spec = CandidateSpec::example("  Alice ", "22b045 ");
        assert!(spec.validate().is_ok());
        let candidate = spec.into_candidate(&position, false, "voter-1");
        assert_eq!(candidate.name, "Alice");
        assert_eq!(candidate.roll_no, "22B045");
        assert_eq!(candidate.election_id, position.election_id);
        assert!(!candidate.approved);
    }

    #[test]
    fn blank_fields_are_rejected() {
        assert!(CandidateSpec::example("", "22B045").validate().is_err());
        assert!(CandidateSpec::example("Alice", " ").validate().is_err());
    }
}
