use std::error::Error as StdError;

use axum::http::{header::RETRY_AFTER, StatusCode};
use axum::response::{IntoResponse, Response};

use domain::error::{Error as DomainError, ErrorKind};
use log::*;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug)]
pub struct Error(DomainError);

impl StdError for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> core::result::Result<(), std::fmt::Error> {
        write!(fmt, "{self:?}")
    }
}

/// HTTP status for each public error kind.
pub(crate) fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
        ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::AlreadyExists => StatusCode::CONFLICT,
        ErrorKind::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
        ErrorKind::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// List of possible StatusCode variants https://docs.rs/http/latest/http/status/struct.StatusCode.html
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let status = status_for(kind);

        if kind == ErrorKind::InternalError {
            error!("Internal server error: {:?}", self.0);
            return (status, "INTERNAL SERVER ERROR").into_response();
        }

        let reason = self
            .0
            .reason()
            .unwrap_or_else(|| status.canonical_reason().unwrap_or_default().to_uppercase());
        debug!("Request rejected ({status}): {reason}");

        match self.0.retry_after_secs() {
            Some(retry_after_secs) => {
                (status, [(RETRY_AFTER, retry_after_secs.to_string())], reason).into_response()
            }
            None => (status, reason).into_response(),
        }
    }
}

impl<E> From<E> for Error
where
    E: Into<DomainError>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::body_text;
    use domain::error::{InternalErrorKind, RejectedKind};

    #[tokio::test]
    async fn rejections_map_to_their_status_and_reason() {
        for (kind, status) in [
            (RejectedKind::InvalidRequest, StatusCode::BAD_REQUEST),
            (RejectedKind::NotBlocked, StatusCode::BAD_REQUEST),
            (RejectedKind::Unauthenticated, StatusCode::UNAUTHORIZED),
            (RejectedKind::NotFound, StatusCode::NOT_FOUND),
            (RejectedKind::Forbidden, StatusCode::FORBIDDEN),
            (RejectedKind::AlreadyExists, StatusCode::CONFLICT),
        ] {
            let response = Error::from(DomainError::rejected(kind, "because")).into_response();
            assert_eq!(response.status(), status);
            assert_eq!(body_text(response).await, "because");
        }
    }

    #[tokio::test]
    async fn too_many_requests_carries_retry_after() {
        let error = DomainError::too_many_requests(std::time::Duration::from_secs(7));

        let response = Error::from(error).into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[RETRY_AFTER], "7");
        assert_eq!(body_text(response).await, "TOO MANY REQUESTS");
    }

    #[tokio::test]
    async fn internal_errors_are_opaque() {
        let error = DomainError::internal(
            "connection refused to db.internal:5432",
            InternalErrorKind::Other("boom".to_string()),
        );

        let response = Error::from(error).into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_text(response).await, "INTERNAL SERVER ERROR");
    }
}
