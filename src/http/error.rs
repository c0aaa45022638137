//! Error taxonomy for the HTTP surface.

use hyper::StatusCode;
use thiserror::Error;

use crate::resource_actor::RepositoryError;

/// Every condition the HTTP layer can answer with instead of a success body.
///
/// The `Display` text is exactly the `message` sent to the client, so it must
/// never carry internal detail. [`ApiError::Internal`] holds its detail for
/// server-side logging only.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ApiError {
    #[error("Invalid resource ID")]
    InvalidIdentifier,

    #[error("{}", .0.join(", "))]
    ValidationFailed(Vec<String>),

    #[error("Invalid JSON format")]
    MalformedPayload,

    #[error("Request body is required")]
    EmptyBody,

    #[error("Resource not found")]
    NotFound,

    #[error("Endpoint not found")]
    UnknownRoute,

    #[error("Request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("Request body not received in time")]
    BodyTimeout,

    /// Dispatcher only: the selected worker could not be reached.
    #[error("Upstream worker unavailable")]
    UpstreamUnavailable,

    /// Dispatcher only: the registry has no worker to select.
    #[error("No workers available")]
    NoWorkers,

    #[error("Internal server error")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidIdentifier
            | ApiError::ValidationFailed(_)
            | ApiError::MalformedPayload
            | ApiError::EmptyBody => StatusCode::BAD_REQUEST,
            ApiError::NotFound | ApiError::UnknownRoute => StatusCode::NOT_FOUND,
            ApiError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::BodyTimeout => StatusCode::REQUEST_TIMEOUT,
            ApiError::UpstreamUnavailable => StatusCode::BAD_GATEWAY,
            ApiError::NoWorkers => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::InvalidIdentifier(_) => ApiError::InvalidIdentifier,
            RepositoryError::ValidationFailed(messages) => ApiError::ValidationFailed(messages),
            RepositoryError::NotFound(_) => ApiError::NotFound,
            RepositoryError::Unavailable(detail) => ApiError::Internal(detail),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn internal_detail_is_not_displayed() {
        let err = ApiError::Internal("actor mailbox closed".into());
        assert_eq!(err.to_string(), "Internal server error");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn validation_messages_are_joined() {
        let err = ApiError::ValidationFailed(vec!["first".into(), "second".into()]);
        assert_eq!(err.to_string(), "first, second");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn repository_errors_map_to_statuses() {
        let cases = [
            (RepositoryError::InvalidIdentifier("x".into()), StatusCode::BAD_REQUEST),
            (RepositoryError::ValidationFailed(vec![]), StatusCode::BAD_REQUEST),
            (RepositoryError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (RepositoryError::Unavailable("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }
}
