//! Error types for the `domain` layer.
use entity_api::error::{EntityApiErrorKind, Error as EntityApiError};
use std::error::Error as StdError;
use std::fmt;
use std::time::Duration;

/// Top-level domain error type.
/// Errors in the Domain layer are modeled as a tree structure
/// with `domain::error::Error` as the root type holding a tree of `error_kind`
/// enums that represent the kinds of errors that can occur in the domain layer or
/// in lower layers. The `source` field is used to hold the original error that caused
/// the domain error. Ex. `domain` is dependent on `entity_api`, and `web` is dependent on `domain`,
/// but `web` should not be dependent, directly, on `entity_api`. Ultimately the various
/// `error_kind`s are used by `web` to return appropriate HTTP status codes to the client.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: DomainErrorKind,
}

/// Enum representing the major categories of errors that can occur in the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum DomainErrorKind {
    Internal(InternalErrorKind),
    External(ExternalErrorKind),
    /// A business rule refused the request. These are reported to the caller as-is.
    Rejected(RejectedKind),
}

/// Enum representing the various kinds of internal errors that can occur in the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum InternalErrorKind {
    Entity(EntityErrorKind),
    Config,
    /// A multi-step deletion stopped part way; lists the steps that did complete.
    PartialFailure { completed_steps: Vec<String> },
    Other(String),
}

/// Enum representing the various kinds of entity errors that can bubble up from the "Entity" layer (`entity_api` and `entity`).
/// These errors are translated from the `entity_api` layer to the `domain` layer and reduced to a subset of error kinds
/// that are relevant to the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum EntityErrorKind {
    NotFound,
    Invalid,
    AlreadyExists,
    NotUpdated,
    DbTransaction,
    Other(String),
}

/// Enum representing the various kinds of external errors that can occur in the `domain` layer.
#[derive(Debug, PartialEq)]
pub enum ExternalErrorKind {
    BlobStore,
    Other(String),
}

/// Business rule rejections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectedKind {
    InvalidRequest,
    Unauthenticated,
    NotFound,
    Forbidden,
    AlreadyExists,
    NotBlocked,
    /// Admission control refused the request; the caller may retry after
    /// this many seconds.
    TooManyRequests { retry_after_secs: u64 },
}

/// The public classification every domain error reduces to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidRequest,
    Unauthenticated,
    NotFound,
    Forbidden,
    AlreadyExists,
    TooManyRequests,
    InternalError,
}

impl Error {
    /// A business rejection carrying a short, caller-safe reason.
    pub fn rejected(kind: RejectedKind, reason: impl Into<String>) -> Self {
        let reason: String = reason.into();
        Error {
            source: Some(reason.into()),
            error_kind: DomainErrorKind::Rejected(kind),
        }
    }

    /// Admission rejection. The wait is rounded up to whole seconds, never
    /// below one.
    pub fn too_many_requests(retry_after: Duration) -> Self {
        let retry_after_secs = retry_after.as_secs_f64().ceil().max(1.0) as u64;
        Error::rejected(
            RejectedKind::TooManyRequests { retry_after_secs },
            "TOO MANY REQUESTS",
        )
    }

    pub fn internal(source: impl Into<Box<dyn StdError + Send + Sync>>, kind: InternalErrorKind) -> Self {
        Error {
            source: Some(source.into()),
            error_kind: DomainErrorKind::Internal(kind),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match &self.error_kind {
            DomainErrorKind::Rejected(rejected) => match rejected {
                RejectedKind::InvalidRequest | RejectedKind::NotBlocked => ErrorKind::InvalidRequest,
                RejectedKind::Unauthenticated => ErrorKind::Unauthenticated,
                RejectedKind::NotFound => ErrorKind::NotFound,
                RejectedKind::Forbidden => ErrorKind::Forbidden,
                RejectedKind::AlreadyExists => ErrorKind::AlreadyExists,
                RejectedKind::TooManyRequests { .. } => ErrorKind::TooManyRequests,
            },
            DomainErrorKind::Internal(InternalErrorKind::Entity(entity)) => match entity {
                EntityErrorKind::NotFound => ErrorKind::NotFound,
                EntityErrorKind::Invalid => ErrorKind::InvalidRequest,
                EntityErrorKind::AlreadyExists => ErrorKind::AlreadyExists,
                _ => ErrorKind::InternalError,
            },
            _ => ErrorKind::InternalError,
        }
    }

    /// Seconds the caller should wait before retrying, for admission rejections.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self.error_kind {
            DomainErrorKind::Rejected(RejectedKind::TooManyRequests { retry_after_secs }) => {
                Some(retry_after_secs)
            }
            _ => None,
        }
    }

    /// The reason given for a business rejection. Internal errors have none
    /// so that their detail never reaches a caller.
    pub fn reason(&self) -> Option<String> {
        match self.error_kind {
            DomainErrorKind::Rejected(_) => self.source.as_ref().map(|reason| reason.to_string()),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Domain Error: {self:?}")
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

// This is where we translate errors from the `entity_api` layer to the `domain` layer.
impl From<EntityApiError> for Error {
    fn from(err: EntityApiError) -> Self {
        let entity_error_kind = match err.error_kind {
            EntityApiErrorKind::RecordNotFound => EntityErrorKind::NotFound,
            EntityApiErrorKind::InvalidQueryTerm => EntityErrorKind::Invalid,
            EntityApiErrorKind::RecordAlreadyExists => EntityErrorKind::AlreadyExists,
            EntityApiErrorKind::RecordNotUpdated => EntityErrorKind::NotUpdated,
            EntityApiErrorKind::SystemError => EntityErrorKind::DbTransaction,
            _ => EntityErrorKind::Other("EntityErrorKind".to_string()),
        };

        Error {
            source: Some(Box::new(err)),
            error_kind: DomainErrorKind::Internal(InternalErrorKind::Entity(entity_error_kind)),
        }
    }
}

impl From<sea_orm::DbErr> for Error {
    fn from(err: sea_orm::DbErr) -> Self {
        EntityApiError::from(err).into()
    }
}

impl From<jsonwebtoken::errors::Error> for Error {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: DomainErrorKind::Rejected(RejectedKind::Unauthenticated),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: DomainErrorKind::External(ExternalErrorKind::BlobStore),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::internal(err, InternalErrorKind::Other("Serialization error".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_blocked_is_reported_as_invalid_request() {
        let error = Error::rejected(RejectedKind::NotBlocked, "not blocked");
        assert_eq!(error.kind(), ErrorKind::InvalidRequest);
        assert_eq!(error.reason().as_deref(), Some("not blocked"));
    }

    #[test]
    fn too_many_requests_rounds_the_wait_up_to_whole_seconds() {
        let partial = Error::too_many_requests(Duration::from_millis(2500));
        let instant = Error::too_many_requests(Duration::ZERO);

        assert_eq!(partial.kind(), ErrorKind::TooManyRequests);
        assert_eq!(partial.retry_after_secs(), Some(3));
        assert_eq!(instant.retry_after_secs(), Some(1));
        assert_eq!(
            Error::rejected(RejectedKind::Forbidden, "no").retry_after_secs(),
            None
        );
    }

    #[test]
    fn unique_violation_surfaces_as_already_exists() {
        let error: Error = EntityApiError {
            source: None,
            error_kind: EntityApiErrorKind::RecordAlreadyExists,
        }
        .into();
        assert_eq!(error.kind(), ErrorKind::AlreadyExists);
    }

    #[test]
    fn internal_errors_carry_no_reason() {
        let error: Error = EntityApiError {
            source: None,
            error_kind: EntityApiErrorKind::SystemError,
        }
        .into();
        assert_eq!(error.kind(), ErrorKind::InternalError);
        assert_eq!(error.reason(), None);
    }

    #[test]
    fn partial_failure_is_internal() {
        let error = Error::internal(
            "relationships step failed",
            InternalErrorKind::PartialFailure {
                completed_steps: vec!["messages".to_string()],
            },
        );
        assert_eq!(error.kind(), ErrorKind::InternalError);
    }
}
