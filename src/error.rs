use std::fmt::{Display, Formatter};

use jsonwebtoken::errors::Error as JwtError;
use mongodb::error::Error as DbError;
use rocket::{
    http::Status,
    response::{status::Custom, Responder},
    serde::json::Json,
    Request,
};
use serde::Serialize;
use thiserror::Error;

use crate::model::mongodb::{is_transient, Id};

pub type Result<T> = std::result::Result<T, Error>;

/// Why a ballot was refused, as determined by re-reading the election after
/// its conditional write matched nothing.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CastRejection {
    NotFound,
    WindowClosed,
    AlreadyVoted,
    InvalidNominee,
}

impl Display for CastRejection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            Self::NotFound => "election not found",
            Self::WindowClosed => "voting is not open",
            Self::AlreadyVoted => "ballot already cast",
            Self::InvalidNominee => "nominee not found in this election",
        };
        f.write_str(reason)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid request: {0}")]
    Validation(String),
    #[error("Unknown member {0}")]
    InvalidReference(Id),
    #[error("End time must be in the future")]
    InvalidWindow,
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Ballot refused: {0}")]
    Ballot(CastRejection),
    #[error("Voting for election {0} has closed")]
    WindowClosed(Id),
    #[error("Voting for election {0} is still in progress")]
    TooEarly(Id),
    #[error("Results for election {0} have already been published")]
    AlreadyPublished(Id),
    #[error("Election {0} has no nominees")]
    NoNominees(Id),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("Invariant violated: {0}")]
    InvariantViolation(String),
}

impl Error {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Can the failed operation be retried as-is?
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Db(err) => is_transient(err),
            Self::StoreUnavailable(_) => true,
            _ => false,
        }
    }

    /// Short machine-readable name of the error class.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::InvalidReference(_) => "invalid_reference",
            Self::InvalidWindow => "invalid_window",
            Self::NotFound(_) | Self::Ballot(CastRejection::NotFound) => "not_found",
            Self::Ballot(CastRejection::InvalidNominee) => "invalid_nominee",
            Self::Ballot(CastRejection::AlreadyVoted) => "already_voted",
            Self::Ballot(CastRejection::WindowClosed) | Self::WindowClosed(_) => "window_closed",
            Self::TooEarly(_) => "too_early",
            Self::AlreadyPublished(_) => "already_published",
            Self::NoNominees(_) => "no_nominees",
            Self::Conflict(_) => "conflict",
            Self::Unauthorized(_) | Self::Jwt(_) => "unauthorized",
            Self::Db(_) | Self::StoreUnavailable(_) => "store_unavailable",
            Self::InvariantViolation(_) => "internal",
        }
    }

    pub fn status(&self) -> Status {
        match self {
            Self::Validation(_) | Self::InvalidReference(_) | Self::InvalidWindow => {
                Status::BadRequest
            }
            Self::NotFound(_)
            | Self::Ballot(CastRejection::NotFound)
            | Self::Ballot(CastRejection::InvalidNominee) => Status::NotFound,
            Self::Ballot(_)
            | Self::WindowClosed(_)
            | Self::AlreadyPublished(_)
            | Self::NoNominees(_)
            | Self::Conflict(_) => Status::Conflict,
            Self::TooEarly(_) => Status::Forbidden,
            Self::Unauthorized(_) | Self::Jwt(_) => Status::Unauthorized,
            Self::Db(_) | Self::StoreUnavailable(_) => Status::ServiceUnavailable,
            Self::InvariantViolation(_) => Status::InternalServerError,
        }
    }
}

impl From<CastRejection> for Error {
    fn from(rejection: CastRejection) -> Self {
        Self::Ballot(rejection)
    }
}

/// JSON body sent alongside every error status.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> rocket::response::Result<'o> {
        let status = self.status();
        match status.code {
            500..=599 => error!("{} {}: {self}", req.method(), req.uri()),
            _ => debug!("{} {}: {self}", req.method(), req.uri()),
        }
        let body = ErrorBody {
            error: self.kind(),
            message: self.to_string(),
        };
        Custom(status, Json(body)).respond_to(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ballot_rejections_map_to_statuses() {
        let id = Id::new();
        assert_eq!(Error::from(CastRejection::AlreadyVoted).status(), Status::Conflict);
        assert_eq!(Error::from(CastRejection::WindowClosed).status(), Status::Conflict);
        assert_eq!(Error::from(CastRejection::InvalidNominee).status(), Status::NotFound);
        assert_eq!(Error::from(CastRejection::NotFound).kind(), "not_found");
        assert_eq!(Error::TooEarly(id).status(), Status::Forbidden);
        assert_eq!(Error::InvalidReference(id).status(), Status::BadRequest);
    }

    #[test]
    fn only_store_failures_are_transient() {
        assert!(Error::StoreUnavailable("down".to_string()).is_transient());
        assert!(!Error::Conflict("busy".to_string()).is_transient());
        assert!(!Error::InvariantViolation("corrupt".to_string()).is_transient());
        assert_eq!(
            Error::StoreUnavailable("down".to_string()).status(),
            Status::ServiceUnavailable
        );
    }
}
