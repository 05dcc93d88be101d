use std::collections::HashMap;

use chrono::{DateTime, Utc};
use mongodb::{
    bson::{self, doc, Document},
    options::SessionOptions,
    Client, Database,
};
use rocket::futures::TryStreamExt;
use serde::Deserialize;

use crate::error::Result;
use crate::model::{
    api::election::{tally, ElectionResults},
    db::{candidate::Candidate, election::Election, position::Position, vote::Vote},
    mongodb::{Coll, Id},
};

/// One row of the vote count aggregation.
#[derive(Debug, Deserialize)]
struct VoteCount {
    #[serde(rename = "_id")]
    candidate_id: Id,
    count: u64,
}

/// Read-only projection of the vote ledger into ranked results.
pub struct ResultAggregator {
    db_client: Client,
    positions: Coll<Position>,
    candidates: Coll<Candidate>,
    votes: Coll<Vote>,
}

impl ResultAggregator {
    pub fn new(db_client: &Client, db: &Database) -> Self {
        Self {
            db_client: db_client.clone(),
            positions: Coll::from_db(db),
            candidates: Coll::from_db(db),
            votes: Coll::from_db(db),
        }
    }

    /// Tally an election as of `now`.
    ///
    /// Every read happens inside one snapshot session, so positions, candidates
    /// and votes agree with each other.
    pub async fn results(
        &self,
        election: &Election,
        now: DateTime<Utc>,
    ) -> Result<ElectionResults> {
        let options = SessionOptions::builder().snapshot(true).build();
        let mut session = self.db_client.start_session(Some(options)).await?;
        let filter = doc! {
            "election_id": election.id,
        };

        let positions: Vec<Position> = self
            .positions
            .find_with_session(filter.clone(), None, &mut session)
            .await?
            .stream(&mut session)
            .try_collect()
            .await?;
        let candidates: Vec<Candidate> = self
            .candidates
            .find_with_session(filter.clone(), None, &mut session)
            .await?
            .stream(&mut session)
            .try_collect()
            .await?;

        let pipeline = [
            doc! { "$match": filter },
            doc! { "$group": { "_id": "$candidate_id", "count": { "$sum": 1 } } },
        ];
        let rows: Vec<Document> = self
            .votes
            .aggregate_with_session(pipeline, None, &mut session)
            .await?
            .stream(&mut session)
            .try_collect()
            .await?;
        let mut counts = HashMap::with_capacity(rows.len());
        for row in rows {
            let row: VoteCount = bson::from_document(row)?;
            counts.insert(row.candidate_id, row.count);
        }

        let positions = tally(&positions, &candidates, &counts);
        Ok(ElectionResults::new(
            election.id,
            election.title.clone(),
            election.phase_at(now),
            positions,
        ))
    }
}
