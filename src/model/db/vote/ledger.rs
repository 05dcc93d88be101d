use chrono::{DateTime, Utc};
use mongodb::{bson::doc, Database};
use rocket::futures::TryStreamExt;

use crate::error::{Error, Result};
use crate::model::{
    api::vote::VoteIntent,
    common::{election::ElectionPhase, identity::VoterIdentity},
    db::{candidate::Candidate, election::Election, position::Position},
    mongodb::{is_duplicate_key_error, Coll, Id},
};

use super::{NewVote, Vote};

/// Pick the allowance slot for a new vote, given the voter's existing
/// `(slot, candidate)` pairs for the position.
///
/// Returns the lowest free slot below `max_votes`.
pub fn next_slot(existing: &[(u32, Id)], candidate_id: Id, max_votes: u32) -> Result<u32> {
    if existing.iter().any(|(_, id)| *id == candidate_id) {
        return Err(Error::AlreadyVoted(format!(
            "already voted for candidate {candidate_id}"
        )));
    }
    (0..max_votes)
        .find(|slot| !existing.iter().any(|(taken, _)| taken == slot))
        .ok_or_else(|| {
            Error::AlreadyVoted(format!(
                "all {max_votes} vote(s) for this position have been used"
            ))
        })
}

/// The result of a vote batch: everything committed before the first failure,
/// and that failure if there was one.
#[derive(Debug)]
pub struct BatchOutcome {
    pub committed: Vec<Vote>,
    pub failure: Option<(usize, Error)>,
}

/// Append-only record of votes.
///
/// Each vote occupies one of the voter's `max_votes_per_voter` slots for its
/// position. The unique `{voter_id, position_id, slot}` index makes the
/// allowance race-free; `{voter_id, candidate_id}` stops repeat votes.
pub struct VoteLedger {
    votes: Coll<Vote>,
    candidates: Coll<Candidate>,
    positions: Coll<Position>,
    elections: Coll<Election>,
}

impl VoteLedger {
    pub fn new(db: &Database) -> Self {
        Self {
            votes: Coll::from_db(db),
            candidates: Coll::from_db(db),
            positions: Coll::from_db(db),
            elections: Coll::from_db(db),
        }
    }

    /// Cast each intent in order, stopping at the first failure.
    ///
    /// Votes committed before the failure stay committed.
    pub async fn cast_batch(
        &self,
        voter_id: &str,
        identity: &VoterIdentity,
        intents: &[VoteIntent],
    ) -> BatchOutcome {
        let mut committed = Vec::with_capacity(intents.len());
        for (index, intent) in intents.iter().enumerate() {
            match self.cast(voter_id, identity, intent, Utc::now()).await {
                Ok(vote) => committed.push(vote),
                Err(err) => {
                    debug!("Vote intent {index} from {voter_id} failed: {err}");
                    return BatchOutcome {
                        committed,
                        failure: Some((index, err)),
                    };
                }
            }
        }
        BatchOutcome {
            committed,
            failure: None,
        }
    }

    /// Cast a single vote.
    pub async fn cast(
        &self,
        voter_id: &str,
        identity: &VoterIdentity,
        intent: &VoteIntent,
        now: DateTime<Utc>,
    ) -> Result<Vote> {
        let (candidate, position, election) = self.resolve(intent).await?;

        let phase = election.phase_at(now);
        if phase != ElectionPhase::Active {
            return Err(Error::ElectionNotActive(format!(
                "election '{}' is {:?}",
                election.title, phase
            )));
        }

        let mut existing = self.slots_used(voter_id, position.id).await?;
        next_slot(&existing, candidate.id, position.max_votes_per_voter)?;

        if let Err(mismatch) = position.restrictions.check(identity) {
            return Err(Error::Ineligible(format!(
                "cannot vote for '{}': {mismatch}",
                position.title
            )));
        }

        loop {
            let slot = next_slot(&existing, candidate.id, position.max_votes_per_voter)?;
            let vote = Vote {
                id: Id::new(),
                vote: NewVote {
                    voter_id: voter_id.to_string(),
                    election_id: election.id,
                    position_id: position.id,
                    candidate_id: candidate.id,
                    slot,
                    timestamp: now,
                },
            };
            match self.votes.insert_one(&vote, None).await {
                Ok(_) => return Ok(vote),
                Err(e) if is_duplicate_key_error(&e) => {
                    debug!(
                        "Slot {slot} of position {} already taken by {voter_id}, re-reading",
                        position.id
                    );
                    existing = self.slots_used(voter_id, position.id).await?;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Resolve an intent to its approved candidate, position and visible election.
    async fn resolve(&self, intent: &VoteIntent) -> Result<(Candidate, Position, Election)> {
        let filter = doc! {
            "_id": *intent.candidate,
            "approved": true,
        };
        let candidate = self
            .candidates
            .find_one(filter, None)
            .await?
            .ok_or_else(|| Error::not_found(format!("Candidate {}", intent.candidate)))?;
        if let Some(position_id) = intent.position {
            if *position_id != candidate.position_id {
                return Err(Error::BadRequest(format!(
                    "candidate {} does not stand for position {position_id}",
                    candidate.id
                )));
            }
        }

        let position = self
            .positions
            .find_one(candidate.position_id.as_doc(), None)
            .await?
            .ok_or_else(|| Error::not_found(format!("Position {}", candidate.position_id)))?;
        let filter = doc! {
            "_id": position.election_id,
            "display_election": true,
        };
        let election = self
            .elections
            .find_one(filter, None)
            .await?
            .ok_or_else(|| Error::not_found(format!("Election {}", position.election_id)))?;

        Ok((candidate, position, election))
    }

    /// The `(slot, candidate)` pairs this voter has used for a position.
    pub async fn slots_used(&self, voter_id: &str, position_id: Id) -> Result<Vec<(u32, Id)>> {
        let filter = doc! {
            "voter_id": voter_id,
            "position_id": position_id,
        };
        let votes: Vec<Vote> = self.votes.find(filter, None).await?.try_collect().await?;
        Ok(votes.iter().map(|v| (v.slot, v.candidate_id)).collect())
    }

    /// Whether this voter has cast any vote in the election.
    pub async fn has_voted(&self, voter_id: &str, election_id: Id) -> Result<bool> {
        let filter = doc! {
            "voter_id": voter_id,
            "election_id": election_id,
        };
        Ok(self.votes.find_one(filter, None).await?.is_some())
    }

    /// All votes cast by this voter, optionally restricted to one election.
    pub async fn votes_by(&self, voter_id: &str, election_id: Option<Id>) -> Result<Vec<Vote>> {
        let mut filter = doc! {
            "voter_id": voter_id,
        };
        if let Some(election_id) = election_id {
            filter.insert("election_id", election_id);
        }
        let votes = self.votes.find(filter, None).await?.try_collect().await?;
        Ok(votes)
    }
}
