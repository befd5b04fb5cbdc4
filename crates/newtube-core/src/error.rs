//! Error types shared across the newtube crates.

use thiserror::Error;

/// The common error type returned by channel, log, and storage operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The requested resource was not found.
    #[error("not found: {resource_type} with id '{id}'")]
    NotFound {
        /// The type of resource that was not found.
        resource_type: &'static str,
        /// The identifier of the resource.
        id: String,
    },

    /// The caller's role does not permit the attempted operation.
    #[error("permission denied: {reason}")]
    PermissionDenied {
        /// The reason for the denial.
        reason: String,
    },

    /// The provided input failed validation.
    #[error("invalid input: {field} - {message}")]
    InvalidInput {
        /// The field that was invalid.
        field: &'static str,
        /// A description of why the input was invalid.
        message: String,
    },

    /// An operation conflicted with the current state (e.g. a second active invite).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A bounded wait elapsed before the awaited condition was reached.
    #[error("timed out waiting for {0}")]
    Timeout(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A (de)serialization error occurred.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// An internal invariant was violated.
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized `Result` for newtube operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates a new not found error.
    #[must_use]
    pub fn not_found(resource_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type,
            id: id.into(),
        }
    }

    /// Creates a new permission denied error.
    #[must_use]
    pub fn permission_denied(reason: impl Into<String>) -> Self {
        Self::PermissionDenied {
            reason: reason.into(),
        }
    }

    /// Creates a new invalid input error.
    #[must_use]
    pub fn invalid_input(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            field,
            message: message.into(),
        }
    }

    /// Creates a new conflict error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Creates a new timeout error.
    #[must_use]
    pub fn timeout(waiting_for: impl Into<String>) -> Self {
        Self::Timeout(waiting_for.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn not_found_display() {
        let err = Error::not_found("video", "abc123");
        assert_eq!(err.to_string(), "not found: video with id 'abc123'");
    }

    #[test]
    fn permission_denied_display() {
        let err = Error::permission_denied("writer role required");
        assert_eq!(err.to_string(), "permission denied: writer role required");
    }

    #[test]
    fn conflict_display() {
        let err = Error::conflict("an invite is already active");
        assert_eq!(err.to_string(), "conflict: an invite is already active");
    }

    #[test]
    fn timeout_display() {
        let err = Error::timeout("initial sync");
        assert_eq!(err.to_string(), "timed out waiting for initial sync");
    }
}
