use std::time::Duration;

use mongodb::{
    bson::doc,
    error::TRANSIENT_TRANSACTION_ERROR,
    Client, Database,
};

use crate::error::{Error, Result};
use crate::model::{
    db::position::Position,
    mongodb::{is_duplicate_key_error, Coll, Id},
};

use super::{Candidate, NewCandidate};

/// Attempts at a registration transaction before giving up on write conflicts.
const MAX_ATTEMPTS: u32 = 20;

/// Guards the rule that a roll number stands for at most one position per election,
/// and each position's cap on candidacies.
///
/// The unique `{election_id, roll_no}` index is the authoritative guard; the
/// lookups here exist to produce a precise error.
pub struct CandidacyRegistry {
    db_client: Client,
    candidates: Coll<Candidate>,
    new_candidates: Coll<NewCandidate>,
    positions: Coll<Position>,
}

impl CandidacyRegistry {
    pub fn new(db_client: &Client, db: &Database) -> Self {
        Self {
            db_client: db_client.clone(),
            candidates: Coll::from_db(db),
            new_candidates: Coll::from_db(db),
            positions: Coll::from_db(db),
        }
    }

    /// Register a new candidacy.
    pub async fn register(&self, candidate: NewCandidate) -> Result<Candidate> {
        self.check_conflict(&candidate, None).await?;

        let candidate = Candidate {
            id: Id::new(),
            candidate,
        };
        let mut attempt = 1;
        loop {
            match self.insert_within_cap(&candidate).await {
                Ok(()) => break,
                Err(Error::Db(e)) if is_duplicate_key_error(&e) => {
                    return Err(self.classify_race(&candidate).await)
                }
                Err(Error::Db(e))
                    if e.contains_label(TRANSIENT_TRANSACTION_ERROR) && attempt < MAX_ATTEMPTS =>
                {
                    debug!(
                        "Registration of {} conflicted, retrying (attempt {attempt})",
                        candidate.roll_no
                    );
                    rocket::tokio::time::sleep(Duration::from_millis(5 * u64::from(attempt))).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            "Registered candidate {} for position {} (approved: {})",
            candidate.roll_no, candidate.position_id, candidate.approved
        );
        Ok(candidate)
    }

    /// Insert the candidacy unless its position is already full.
    ///
    /// Bumping the position's registration counter first makes concurrent
    /// registrations for one position conflict, so the count stays exact.
    async fn insert_within_cap(&self, candidate: &Candidate) -> Result<()> {
        let mut session = self.db_client.start_session(None).await?;
        session.start_transaction(None).await?;

        let position = self
            .positions
            .find_one_and_update_with_session(
                candidate.position_id.as_doc(),
                doc! { "$inc": { "registrations": 1 } },
                None,
                &mut session,
            )
            .await?
            .ok_or_else(|| Error::not_found(format!("Position {}", candidate.position_id)))?;

        if let Some(max_candidates) = position.max_candidates {
            let registered = self
                .candidates
                .count_documents_with_session(
                    doc! { "position_id": candidate.position_id },
                    None,
                    &mut session,
                )
                .await?;
            if registered >= u64::from(max_candidates) {
                return Err(Error::PositionFull(format!(
                    "'{}' already has {registered} of {max_candidates} candidates",
                    position.title
                )));
            }
        }

        self.candidates
            .insert_one_with_session(candidate, None, &mut session)
            .await?;
        session.commit_transaction().await?;
        Ok(())
    }

    /// Replace an existing candidacy, re-validating roll number uniqueness
    /// against every other candidacy in the election.
    pub async fn update(&self, id: Id, candidate: NewCandidate) -> Result<Candidate> {
        self.check_conflict(&candidate, Some(id)).await?;

        match self
            .new_candidates
            .replace_one(id.as_doc(), &candidate, None)
            .await
        {
            Ok(result) if result.matched_count == 0 => Err(Error::not_found(format!("Candidate {id}"))),
            Ok(_) => Ok(Candidate { id, candidate }),
            Err(e) if is_duplicate_key_error(&e) => Err(self.classify_race(&candidate).await),
            Err(e) => Err(e.into()),
        }
    }

    /// Fail if the candidate's roll number is already registered in the election,
    /// ignoring the candidacy with ID `exclude`.
    async fn check_conflict(&self, candidate: &NewCandidate, exclude: Option<Id>) -> Result<()> {
        let mut filter = doc! {
            "election_id": candidate.election_id,
            "roll_no": &candidate.roll_no,
        };
        if let Some(exclude) = exclude {
            filter.insert("_id", doc! { "$ne": exclude });
        }
        let existing = match self.candidates.find_one(filter, None).await? {
            Some(existing) => existing,
            None => return Ok(()),
        };

        if existing.position_id == candidate.position_id {
            return Err(Error::DuplicatePosition(format!(
                "{} is already a candidate for this position",
                candidate.roll_no
            )));
        }
        let title = self
            .positions
            .find_one(existing.position_id.as_doc(), None)
            .await?
            .map(|position| position.position.title)
            .unwrap_or_else(|| existing.position_id.to_string());
        Err(Error::DuplicateElection(format!(
            "{} is already a candidate for '{}' in this election",
            candidate.roll_no, title
        )))
    }

    /// Explain a unique index violation we lost a race on.
    async fn classify_race(&self, candidate: &NewCandidate) -> Error {
        match self.check_conflict(candidate, None).await {
            Err(err) => err,
            // The conflicting row vanished again before we could look at it.
            Ok(()) => Error::DuplicateElection(format!(
                "{} was registered concurrently in this election",
                candidate.roll_no
            )),
        }
    }
}
