use std::collections::HashMap;

use data_encoding::HEXLOWER;
use rocket::serde::json::serde_json;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::model::{
    api::id::ApiId,
    common::election::ElectionPhase,
    db::{candidate::Candidate, position::Position},
    mongodb::Id,
};

/// One candidate's standing within a position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateTally {
    pub candidate_id: ApiId,
    pub name: String,
    pub roll_no: String,
    pub vote_count: u64,
}

/// Ranked results for a single position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionResult {
    pub position_id: ApiId,
    pub title: String,
    pub max_votes_per_voter: u32,
    /// Sorted by vote count descending, then candidate ID ascending.
    pub candidates: Vec<CandidateTally>,
    pub total_votes: u64,
}

/// Results for a whole election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionResults {
    pub election_id: ApiId,
    pub title: String,
    pub phase: ElectionPhase,
    pub positions: Vec<PositionResult>,
    /// Lower-case hex SHA-256 of the JSON encoding of `positions`.
    pub digest: String,
}

impl ElectionResults {
    pub fn new(
        election_id: Id,
        title: String,
        phase: ElectionPhase,
        positions: Vec<PositionResult>,
    ) -> Self {
        let digest = digest(&positions);
        Self {
            election_id: election_id.into(),
            title,
            phase,
            positions,
            digest,
        }
    }

    /// Recompute the digest and compare it with the one we carry.
    pub fn verify_digest(&self) -> bool {
        digest(&self.positions) == self.digest
    }
}

fn digest(positions: &[PositionResult]) -> String {
    // Serialising plain structs and vectors cannot fail.
    let canonical = serde_json::to_vec(positions).unwrap_or_default();
    HEXLOWER.encode(&Sha256::digest(canonical))
}

/// Rank the approved candidates of each position by their vote counts.
///
/// Candidates missing from `counts` have no votes. Unapproved candidates are
/// left out entirely.
pub fn tally(
    positions: &[Position],
    candidates: &[Candidate],
    counts: &HashMap<Id, u64>,
) -> Vec<PositionResult> {
    let mut results: Vec<PositionResult> = positions
        .iter()
        .map(|position| {
            let mut ranked: Vec<CandidateTally> = candidates
                .iter()
                .filter(|c| c.approved && c.position_id == position.id)
                .map(|c| CandidateTally {
                    candidate_id: c.id.into(),
                    name: c.name.clone(),
                    roll_no: c.roll_no.clone(),
                    vote_count: counts.get(&c.id).copied().unwrap_or(0),
                })
                .collect();
            ranked.sort_by(|a, b| {
                b.vote_count
                    .cmp(&a.vote_count)
                    .then_with(|| a.candidate_id.cmp(&b.candidate_id))
            });
            PositionResult {
                position_id: position.id.into(),
                title: position.title.clone(),
                max_votes_per_voter: position.max_votes_per_voter,
                total_votes: ranked.iter().map(|c| c.vote_count).sum(),
                candidates: ranked,
            }
        })
        .collect();
    results.sort_by(|a, b| {
        a.title
            .cmp(&b.title)
            .then_with(|| a.position_id.cmp(&b.position_id))
    });
    results
}
