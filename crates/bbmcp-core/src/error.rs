//! Error types for bbmcp.

use thiserror::Error;

/// Main error type for bbmcp operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Connection-level failure talking to the remote API
    #[error("HTTP error: {0}")]
    Http(String),

    /// The remote API answered with an unexpected status code
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Response body could not be decoded
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// A tool argument is missing or has the wrong type
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// The requested tool is not registered
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Build an API error from a non-success status and the (possibly empty) response body.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        let message = if body.trim().is_empty() {
            format!("API request failed with status {}", status)
        } else {
            format!("API request failed with status {}: {}", status, body.trim())
        };
        Error::Api { status, message }
    }

    /// HTTP status code carried by an API error.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the failure happened below the HTTP status level
    /// (connection failure or an undecodable response).
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Http(_) | Error::InvalidData(_))
    }
}

/// Result type alias for bbmcp operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_with_body() {
        let err = Error::from_status(409, "version mismatch\n");
        assert_eq!(err.status(), Some(409));
        assert_eq!(
            err.to_string(),
            "API error: 409 - API request failed with status 409: version mismatch"
        );
    }

    #[test]
    fn test_from_status_without_body() {
        let err = Error::from_status(404, "");
        assert_eq!(err.status(), Some(404));
        assert!(err.to_string().ends_with("API request failed with status 404"));
        assert!(!err.is_transport());
    }

    #[test]
    fn test_transport_classification() {
        assert!(Error::Http("connection refused".into()).is_transport());
        assert!(Error::InvalidData("bad json".into()).is_transport());
        assert!(!Error::InvalidArguments("x".into()).is_transport());
        assert_eq!(Error::Http("boom".into()).status(), None);
    }
}
