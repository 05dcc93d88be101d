use std::ops::Deref;

use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};
use rocket::{
    request::{self, FromRequest, Request},
    State,
};

use crate::model::db::{
    candidate::{Candidate, NewCandidate},
    election::{Election, NewElection},
    position::{NewPosition, Position},
    roster::RosterEntry,
    vote::{NewVote, Vote},
};

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[rocket::async_trait]
impl<'r, T> FromRequest<'r> for Coll<T>
where
    T: MongoCollection,
{
    type Error = ();

    /// Get the database connection from the managed state and wrap it in a collection.
    ///
    /// Panics iff the [`Database`] is not managed by [`rocket::Rocket`].
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let db = req.guard::<&State<Database>>().await.unwrap();
        request::Outcome::Success(Coll::from_db(db))
    }
}

// Election collections
const ELECTIONS: &str = "elections";
impl MongoCollection for Election {
    const NAME: &'static str = ELECTIONS;
}
impl MongoCollection for NewElection {
    const NAME: &'static str = ELECTIONS;
}

// Position collections
const POSITIONS: &str = "positions";
impl MongoCollection for Position {
    const NAME: &'static str = POSITIONS;
}
impl MongoCollection for NewPosition {
    const NAME: &'static str = POSITIONS;
}

// Candidate collections
const CANDIDATES: &str = "candidates";
impl MongoCollection for Candidate {
    const NAME: &'static str = CANDIDATES;
}
impl MongoCollection for NewCandidate {
    const NAME: &'static str = CANDIDATES;
}

// Vote collections
const VOTES: &str = "votes";
impl MongoCollection for Vote {
    const NAME: &'static str = VOTES;
}
impl MongoCollection for NewVote {
    const NAME: &'static str = VOTES;
}

// Roster collection
impl MongoCollection for RosterEntry {
    const NAME: &'static str = "roster";
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();

    // Position collection.
    let position_index = IndexModel::builder()
        .keys(doc! {"election_id": 1})
        .build();
    Coll::<Position>::from_db(db)
        .create_index(position_index, None)
        .await?;

    // Candidate collection: a roll number stands at most once per election.
    let candidate_index = IndexModel::builder()
        .keys(doc! {"election_id": 1, "roll_no": 1})
        .options(unique.clone())
        .build();
    let candidate_position_index = IndexModel::builder()
        .keys(doc! {"position_id": 1, "approved": 1})
        .build();
    Coll::<Candidate>::from_db(db)
        .create_indexes([candidate_index, candidate_position_index], None)
        .await?;

    // Vote collection: one vote per allowance slot, and never the same candidate twice.
    let vote_slot_index = IndexModel::builder()
        .keys(doc! {"voter_id": 1, "position_id": 1, "slot": 1})
        .options(unique.clone())
        .build();
    let vote_candidate_index = IndexModel::builder()
        .keys(doc! {"voter_id": 1, "candidate_id": 1})
        .options(unique.clone())
        .build();
    let vote_election_index = IndexModel::builder()
        .keys(doc! {"election_id": 1, "candidate_id": 1})
        .build();
    Coll::<Vote>::from_db(db)
        .create_indexes(
            [vote_slot_index, vote_candidate_index, vote_election_index],
            None,
        )
        .await?;

    // Roster collection.
    let roster_index = IndexModel::builder()
        .keys(doc! {"email": 1})
        .options(unique)
        .build();
    Coll::<RosterEntry>::from_db(db)
        .create_index(roster_index, None)
        .await?;

    Ok(())
}
