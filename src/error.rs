use std::fmt::Display;

use jsonwebtoken::errors::{Error as JwtError, ErrorKind as JwtErrorKind};
use mongodb::{bson::de::Error as BsonError, error::Error as DbError};
use rocket::{http::Status, response::Responder, serde::json::Json, Request};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid e-mail format: {0}")]
    InvalidFormat(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Ineligible: {0}")]
    Ineligible(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Election not active: {0}")]
    ElectionNotActive(String),
    #[error("Election locked: {0}")]
    ElectionLocked(String),
    #[error("Already voted: {0}")]
    AlreadyVoted(String),
    #[error("Duplicate position: {0}")]
    DuplicatePosition(String),
    #[error("Duplicate election: {0}")]
    DuplicateElection(String),
    #[error("Position full: {0}")]
    PositionFull(String),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Bson(#[from] BsonError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
}

impl Error {
    pub fn not_found(what: impl Display) -> Self {
        Self::NotFound(what.to_string())
    }

    /// Machine-readable reason code.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::InvalidFormat(_) => "InvalidFormat",
            Self::BadRequest(_) => "BadRequest",
            Self::Unauthorized(_) | Self::Jwt(_) => "Unauthorized",
            Self::Ineligible(_) => "Ineligible",
            Self::NotFound(_) => "NotFound",
            Self::ElectionNotActive(_) => "ElectionNotActive",
            Self::ElectionLocked(_) => "ElectionLocked",
            Self::AlreadyVoted(_) => "AlreadyVoted",
            Self::DuplicatePosition(_) => "DuplicatePosition",
            Self::DuplicateElection(_) => "DuplicateElection",
            Self::PositionFull(_) => "PositionFull",
            Self::Db(_) | Self::Bson(_) => "Storage",
        }
    }

    pub fn status(&self) -> Status {
        match self {
            Self::InvalidFormat(_) | Self::BadRequest(_) => Status::BadRequest,
            Self::Unauthorized(_) => Status::Unauthorized,
            Self::Jwt(err) => match err.kind() {
                JwtErrorKind::InvalidKeyFormat => Status::InternalServerError,
                _ => Status::Unauthorized,
            },
            Self::Ineligible(_) => Status::Forbidden,
            Self::NotFound(_) => Status::NotFound,
            Self::ElectionNotActive(_)
            | Self::ElectionLocked(_)
            | Self::AlreadyVoted(_)
            | Self::DuplicatePosition(_)
            | Self::DuplicateElection(_)
            | Self::PositionFull(_) => Status::Conflict,
            Self::Db(_) | Self::Bson(_) => Status::InternalServerError,
        }
    }

    /// The JSON body describing this error.
    pub fn body(&self) -> ErrorBody {
        let message = match self {
            // Don't leak driver internals to clients.
            Self::Db(_) | Self::Bson(_) => "Storage failure".to_string(),
            _ => self.to_string(),
        };
        ErrorBody {
            reason: self.reason().to_string(),
            message,
        }
    }

    /// Log this error at a level matching its severity.
    pub fn log(&self) {
        if self.status().code >= 500 {
            error!("{self}");
        } else {
            debug!("Rejected: {self}");
        }
    }
}

/// Error payload returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub reason: String,
    pub message: String,
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> rocket::response::Result<'o> {
        self.log();
        (self.status(), Json(self.body())).respond_to(req)
    }
}
