//! Error types for the resource repository.

use thiserror::Error;

use crate::framework::FrameworkError;

/// Errors that can occur during repository operations.
///
/// Every expected condition (bad identifier, bad payload, absent resource) is a
/// variant here; callers translate them deterministically instead of unwinding.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RepositoryError {
    /// The identifier does not have the UUID-v4 shape.
    #[error("Invalid resource ID: {0}")]
    InvalidIdentifier(String),

    /// The payload broke one or more field rules, in rule order.
    #[error("Resource validation failed: {}", .0.join(", "))]
    ValidationFailed(Vec<String>),

    /// No resource is stored under the identifier.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// The repository actor is gone. Never expected during normal operation.
    #[error("Repository unavailable: {0}")]
    Unavailable(String),
}

impl From<FrameworkError> for RepositoryError {
    fn from(err: FrameworkError) -> Self {
        match err {
            FrameworkError::NotFound(id) => RepositoryError::NotFound(id),
            FrameworkError::Rejected(violations) => RepositoryError::ValidationFailed(violations),
            other @ (FrameworkError::ActorClosed | FrameworkError::ActorDropped) => {
                RepositoryError::Unavailable(other.to_string())
            }
        }
    }
}
