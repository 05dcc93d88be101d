use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use mongodb::{bson::doc, Client};
use rocket::{futures::TryStreamExt, tokio::sync::RwLock};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::identity::{AcademicStatus, Degree, IdentityDecoder, VoterIdentity},
    mongodb::Coll,
};

/// An authoritative record of a student's programme, uploaded by organizers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub email: String,
    pub roll_no: String,
    pub name: String,
    pub degree: Degree,
    #[serde(default)]
    pub branch: Option<String>,
}

/// In-process index of the roster, keyed by lower-cased e-mail.
///
/// Loaded at ignition and reloaded only through [`VoterRoster::refresh`].
#[derive(Debug, Default)]
pub struct VoterRoster {
    entries: RwLock<HashMap<String, RosterEntry>>,
}

impl VoterRoster {
    fn index(entries: impl IntoIterator<Item = RosterEntry>) -> HashMap<String, RosterEntry> {
        entries
            .into_iter()
            .map(|entry| (entry.email.trim().to_lowercase(), entry))
            .collect()
    }

    /// Build a roster directly from entries, bypassing the database.
    pub fn from_entries(entries: impl IntoIterator<Item = RosterEntry>) -> Self {
        Self {
            entries: RwLock::new(Self::index(entries)),
        }
    }

    /// Reload the index from the database, returning the number of entries.
    pub async fn refresh(&self, roster: &Coll<RosterEntry>) -> Result<usize> {
        let entries: Vec<RosterEntry> = roster.find(None, None).await?.try_collect().await?;
        let index = Self::index(entries);
        let count = index.len();
        *self.entries.write().await = index;
        info!("Loaded {count} voter roster entries");
        Ok(count)
    }

    /// Atomically replace the stored roster, then reload the index.
    pub async fn replace(
        &self,
        db_client: &Client,
        roster: &Coll<RosterEntry>,
        entries: Vec<RosterEntry>,
    ) -> Result<usize> {
        let mut entries = entries;
        let mut seen = HashSet::new();
        for entry in entries.iter_mut() {
            entry.email = entry.email.trim().to_lowercase();
            entry.roll_no = entry.roll_no.trim().to_uppercase();
            if !seen.insert(entry.email.clone()) {
                return Err(Error::BadRequest(format!(
                    "roster lists {} more than once",
                    entry.email
                )));
            }
        }

        let mut session = db_client.start_session(None).await?;
        session.start_transaction(None).await?;
        roster
            .delete_many_with_session(doc! {}, None, &mut session)
            .await?;
        if !entries.is_empty() {
            roster
                .insert_many_with_session(&entries, None, &mut session)
                .await?;
        }
        session.commit_transaction().await?;

        self.refresh(roster).await
    }

    /// Number of entries currently indexed.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Resolve a voter's identity as of `today`.
    ///
    /// The e-mail must decode on its own; a roster entry then overrides the
    /// decoded degree, branch and roll number.
    pub async fn resolve(
        &self,
        decoder: &IdentityDecoder,
        email: &str,
        today: NaiveDate,
    ) -> Result<VoterIdentity> {
        let mut identity = decoder.decode(email, today)?;
        let entries = self.entries.read().await;
        if let Some(entry) = entries.get(&identity.email) {
            identity.degree = entry.degree;
            identity.branch = entry.branch.clone();
            identity.roll_no = entry.roll_no.trim().to_uppercase();
            identity.academic_status = AcademicStatus::derive(entry.degree, identity.entry_year, today)
                .ok_or_else(|| Error::InvalidFormat(format!("'{email}' has no valid entry year")))?;
        }
        Ok(identity)
    }
}
