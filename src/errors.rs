//! Generic error taxonomy shared by every operation adapter.
//!
//! Backend-specific codes and failure texts are translated into these
//! variants at exactly one place per backend (see `classify_*` functions in
//! the backend modules) so that a wording change upstream is a one-line fix.

use thiserror::Error;

/// Failure outcome of an operation adapter.
///
/// Every adapter function either returns a complete output mapping or
/// exactly one of these; partial backend state is never rolled back.
#[derive(Debug, Error)]
pub enum OpError {
    /// A mandatory request field was absent.
    #[error("missing variable: {0}")]
    MissingField(String),

    /// A request field was present but syntactically malformed.
    #[error("invalid variable: {0}")]
    InvalidField(String),

    /// The backend reported that the target entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The backend reported that the entity already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// A precondition for the operation does not hold (for example,
    /// deleting an account that still has associated users).
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// An asynchronous backend job did not finish within the polling
    /// window.
    #[error("timed out waiting for backend job {0}")]
    Timeout(String),

    /// Any backend failure without a more specific mapping. Carries the
    /// raw backend code and message verbatim for diagnostics.
    #[error("backend fault ({code}): {message}")]
    Backend { code: String, message: String },
}

impl OpError {
    /// Backend fault from a raw code/message pair.
    pub fn backend(code: impl ToString, message: impl Into<String>) -> Self {
        OpError::Backend {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for OpError {
    fn from(e: reqwest::Error) -> Self {
        let code = e
            .status()
            .map(|s| s.as_u16().to_string())
            .unwrap_or_else(|| "transport".to_string());
        OpError::Backend {
            code,
            message: e.to_string(),
        }
    }
}

impl From<std::io::Error> for OpError {
    fn from(e: std::io::Error) -> Self {
        OpError::Backend {
            code: "io".to_string(),
            message: e.to_string(),
        }
    }
}

/// Result alias used by every adapter.
pub type OpResult<T = crate::request::OpOutput> = Result<T, OpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_are_short_and_name_the_field() {
        assert_eq!(
            OpError::MissingField("email".to_string()).to_string(),
            "missing variable: email"
        );
        assert_eq!(
            OpError::InvalidField("user".to_string()).to_string(),
            "invalid variable: user"
        );
    }

    #[test]
    fn test_backend_fault_carries_code_and_message() {
        let e = OpError::backend(4019, "something unexpected");
        assert_eq!(e.to_string(), "backend fault (4019): something unexpected");
    }
}
