use chrono::{DateTime, Utc};
use rocket::{http::Status, response::Responder, serde::json::Json, Request};
use serde::{Deserialize, Serialize};

use crate::error::{Error, ErrorBody};
use crate::model::{api::id::ApiId, db::vote::Vote};

/// A request to vote for one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteIntent {
    pub candidate: ApiId,
    /// If given, must be the candidate's position.
    #[serde(default)]
    pub position: Option<ApiId>,
}

/// Proof that a vote was recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteReceipt {
    pub id: ApiId,
    pub election_id: ApiId,
    pub position_id: ApiId,
    pub candidate_id: ApiId,
    pub slot: u32,
    pub timestamp: DateTime<Utc>,
}

impl From<Vote> for VoteReceipt {
    fn from(vote: Vote) -> Self {
        Self {
            id: vote.id.into(),
            election_id: vote.election_id.into(),
            position_id: vote.position_id.into(),
            candidate_id: vote.candidate_id.into(),
            slot: vote.slot,
            timestamp: vote.vote.timestamp,
        }
    }
}

/// A vote batch that stopped early.
///
/// Receipts in `committed` were recorded before the failure and stay recorded.
#[derive(Debug)]
pub struct BatchFailure {
    pub error: Error,
    /// Index of the failed intent, or `None` if the request was refused outright.
    pub intent: Option<usize>,
    pub committed: Vec<VoteReceipt>,
}

impl BatchFailure {
    /// A failure before any intent was attempted.
    pub fn refused(error: Error) -> Self {
        Self {
            error,
            intent: None,
            committed: Vec::new(),
        }
    }

    pub fn status(&self) -> Status {
        self.error.status()
    }
}

impl From<Error> for BatchFailure {
    fn from(error: Error) -> Self {
        Self::refused(error)
    }
}

/// Error payload of a failed vote batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchFailureBody {
    #[serde(flatten)]
    pub error: ErrorBody,
    pub intent: Option<usize>,
    pub committed: Vec<VoteReceipt>,
}

impl<'r, 'o: 'r> Responder<'r, 'o> for BatchFailure {
    fn respond_to(self, req: &'r Request<'_>) -> rocket::response::Result<'o> {
        self.error.log();
        let body = BatchFailureBody {
            error: self.error.body(),
            intent: self.intent,
            committed: self.committed,
        };
        (self.error.status(), Json(body)).respond_to(req)
    }
}
