use std::collections::HashMap;

use mongodb::{
    bson::{self, doc, Document},
    Database,
};
use rocket::futures::TryStreamExt;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{
    db::{candidate::Candidate, vote::Vote},
    mongodb::{Coll, Id},
};

/// How many candidacies and votes an election has collected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionCounts {
    /// Every candidacy, pending ones included.
    pub candidates_count: u64,
    pub votes_count: u64,
}

#[derive(Debug, Deserialize)]
struct GroupCount {
    #[serde(rename = "_id")]
    election_id: Id,
    count: u64,
}

/// Per-election counters shown alongside election summaries.
pub struct ElectionStats {
    candidates: Coll<Candidate>,
    votes: Coll<Vote>,
}

impl ElectionStats {
    pub fn new(db: &Database) -> Self {
        Self {
            candidates: Coll::from_db(db),
            votes: Coll::from_db(db),
        }
    }

    /// Counts for a single election.
    pub async fn for_election(&self, election_id: Id) -> Result<ElectionCounts> {
        let counts = self.for_elections(&[election_id]).await?;
        Ok(counts.get(&election_id).copied().unwrap_or_default())
    }

    /// Counts for each of the given elections. Elections with nothing recorded
    /// are absent from the map.
    pub async fn for_elections(&self, election_ids: &[Id]) -> Result<HashMap<Id, ElectionCounts>> {
        let candidates = count_by_election(&self.candidates, election_ids).await?;
        let votes = count_by_election(&self.votes, election_ids).await?;

        let mut counts: HashMap<Id, ElectionCounts> = HashMap::new();
        for (election_id, count) in candidates {
            counts.entry(election_id).or_default().candidates_count = count;
        }
        for (election_id, count) in votes {
            counts.entry(election_id).or_default().votes_count = count;
        }
        Ok(counts)
    }
}

async fn count_by_election<T>(coll: &Coll<T>, election_ids: &[Id]) -> Result<Vec<(Id, u64)>>
where
    T: Send + Sync,
{
    let pipeline = [
        doc! { "$match": { "election_id": { "$in": election_ids.to_vec() } } },
        doc! { "$group": { "_id": "$election_id", "count": { "$sum": 1 } } },
    ];
    let rows: Vec<Document> = coll.aggregate(pipeline, None).await?.try_collect().await?;
    rows.into_iter()
        .map(|row| -> Result<(Id, u64)> {
            let row: GroupCount = bson::from_document(row)?;
            Ok((row.election_id, row.count))
        })
        .collect()
}
