use chrono::Utc;
use mongodb::bson::doc;
use rocket::futures::TryStreamExt;

use crate::error::{Error, Result};
use crate::model::{
    api::{
        auth::{AuthToken, Voter},
        candidate::CandidateDescription,
        position::PositionDescription,
    },
    common::{
        election::ElectionPhase,
        identity::{IdentityDecoder, VoterIdentity},
    },
    db::{candidate::Candidate, election::Election, position::Position, roster::VoterRoster},
    mongodb::{Coll, Id},
};

/// Fetch an election by ID. Hidden elections only count as existing if `include_hidden`.
pub async fn election_by_id(
    elections: &Coll<Election>,
    election_id: Id,
    include_hidden: bool,
) -> Result<Election> {
    let mut filter = election_id.as_doc();
    if !include_hidden {
        filter.insert("display_election", true);
    }
    elections
        .find_one(filter, None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election {election_id}")))
}

/// Fetch a position, which must belong to the given election.
pub async fn position_in(
    positions: &Coll<Position>,
    election_id: Id,
    position_id: Id,
) -> Result<Position> {
    let filter = doc! {
        "_id": position_id,
        "election_id": election_id,
    };
    positions
        .find_one(filter, None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Position {position_id}")))
}

/// Fetch a candidate, which must stand for the given position.
pub async fn candidate_in(
    candidates: &Coll<Candidate>,
    position_id: Id,
    candidate_id: Id,
) -> Result<Candidate> {
    let filter = doc! {
        "_id": candidate_id,
        "position_id": position_id,
    };
    candidates
        .find_one(filter, None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Candidate {candidate_id}")))
}

/// Refuse administrative edits unless the election has not started yet.
pub fn require_upcoming(election: &Election, action: &str) -> Result<()> {
    let phase = election.phase();
    if phase != ElectionPhase::Upcoming {
        return Err(Error::ElectionLocked(format!(
            "cannot {action}: election '{}' is {phase:?}",
            election.title
        )));
    }
    Ok(())
}

/// Resolve the academic identity of the voter presenting `token`, as of today.
pub async fn voter_identity(
    token: &AuthToken<Voter>,
    roster: &VoterRoster,
    decoder: &IdentityDecoder,
) -> Result<VoterIdentity> {
    roster
        .resolve(decoder, &token.email, Utc::now().date_naive())
        .await
}

/// Describe every position of an election along with its candidates.
pub async fn describe_positions(
    positions: &Coll<Position>,
    candidates: &Coll<Candidate>,
    election_id: Id,
    approved_only: bool,
) -> Result<Vec<PositionDescription>> {
    let filter = doc! {
        "election_id": election_id,
    };
    let mut all_positions: Vec<Position> = positions
        .find(filter.clone(), None)
        .await?
        .try_collect()
        .await?;
    all_positions.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.id.cmp(&b.id)));

    let mut candidate_filter = filter;
    if approved_only {
        candidate_filter.insert("approved", true);
    }
    let mut all_candidates: Vec<Candidate> = candidates
        .find(candidate_filter, None)
        .await?
        .try_collect()
        .await?;
    all_candidates.sort_by_key(|c| c.id);

    let descriptions = all_positions
        .into_iter()
        .map(|position| {
            let standing = all_candidates
                .iter()
                .filter(|c| c.position_id == position.id)
                .cloned()
                .map(CandidateDescription::from)
                .collect();
            PositionDescription::new(position, standing)
        })
        .collect();
    Ok(descriptions)
}
