use chrono::{DateTime, Utc};
use mongodb::bson::{doc, Document};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::db::election::NewElection;

fn default_true() -> bool {
    true
}

/// An election specification, as submitted by an organizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionSpec {
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// Voting opens.
    pub start_time: DateTime<Utc>,
    /// Voting closes.
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub display_results: bool,
    #[serde(default = "default_true")]
    pub display_election: bool,
}

impl ElectionSpec {
    /// Check the spec describes a usable election.
    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(Error::BadRequest("election title is empty".to_string()));
        }
        if self.start_time >= self.end_time {
            return Err(Error::BadRequest(format!(
                "election must start before it ends ({} >= {})",
                self.start_time, self.end_time
            )));
        }
        Ok(())
    }

    /// Convert this spec into an election owned by `created_by`.
    pub fn into_election(self, created_by: &str) -> NewElection {
        NewElection {
            title: self.title.trim().to_string(),
            description: self.description,
            start_time: self.start_time,
            end_time: self.end_time,
            created_by: created_by.to_string(),
            display_results: self.display_results,
            display_election: self.display_election,
        }
    }
}

/// A partial update of an election's visibility flags.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DisplayFlags {
    #[serde(default)]
    pub display_results: Option<bool>,
    #[serde(default)]
    pub display_election: Option<bool>,
}

impl DisplayFlags {
    /// The `$set` update for these flags, or `None` if nothing is being changed.
    pub fn as_update(&self) -> Option<Document> {
        let mut set = Document::new();
        if let Some(display_results) = self.display_results {
            set.insert("display_results", display_results);
        }
        if let Some(display_election) = self.display_election {
            set.insert("display_election", display_election);
        }
        (!set.is_empty()).then(|| doc! { "$set": set })
    }
}
