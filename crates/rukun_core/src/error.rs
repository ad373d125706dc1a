use std::fmt;

use serde_json::Value;
use thiserror::Error;

/// Why a refresh operation could not produce a new access token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshFailure {
    NoRefreshToken,
    Network(String),
    ServerRejected { status: u16, message: String },
    Timeout,
    /// Logout or a new login replaced the session while the exchange ran
    SessionEnded,
}

impl fmt::Display for RefreshFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoRefreshToken => write!(f, "no refresh token available"),
            Self::Network(msg) => write!(f, "network error: {}", msg),
            Self::ServerRejected { status, message } => {
                write!(f, "server rejected refresh ({}): {}", status, message)
            }
            Self::Timeout => write!(f, "refresh timed out"),
            Self::SessionEnded => write!(f, "session ended during refresh"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("network error: {0}")]
    Network(String),

    #[error("unauthorized: {0}")]
    Unauthorized(Value),

    #[error("session refresh failed: {0}")]
    RefreshFailed(RefreshFailure),

    #[error("request failed with status {status}: {payload}")]
    Api { status: u16, payload: Value },

    #[error("credential storage error: {0}")]
    CredentialStorage(String),

    #[error("invalid response from server: {0}")]
    InvalidServerResponse(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True when the error means the session is gone and the user must log in again
    pub fn requires_login(&self) -> bool {
        matches!(self, Error::RefreshFailed(_))
    }
}

impl From<RefreshFailure> for Error {
    fn from(failure: RefreshFailure) -> Self {
        Error::RefreshFailed(failure)
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_from_string() {
        let err: Error = String::from("test error").into();
        if let Error::Other(msg) = err {
            assert_eq!(msg, "test error");
        } else {
            panic!("Expected Error::Other");
        }
    }

    #[test]
    fn test_error_from_str() {
        let err: Error = "test error".into();
        assert!(matches!(err, Error::Other(ref msg) if msg == "test error"));
    }

    #[test]
    fn test_refresh_failure_display() {
        assert_eq!(
            RefreshFailure::NoRefreshToken.to_string(),
            "no refresh token available"
        );
        assert_eq!(
            RefreshFailure::Network("connection reset".to_string()).to_string(),
            "network error: connection reset"
        );
        assert_eq!(
            RefreshFailure::ServerRejected {
                status: 401,
                message: "token revoked".to_string()
            }
            .to_string(),
            "server rejected refresh (401): token revoked"
        );
        assert_eq!(RefreshFailure::Timeout.to_string(), "refresh timed out");
        assert_eq!(
            RefreshFailure::SessionEnded.to_string(),
            "session ended during refresh"
        );
    }

    #[test]
    fn test_error_display_variants() {
        assert_eq!(
            Error::RefreshFailed(RefreshFailure::Timeout).to_string(),
            "session refresh failed: refresh timed out"
        );
        assert_eq!(
            Error::Unauthorized(json!({"message": "expired"})).to_string(),
            r#"unauthorized: {"message":"expired"}"#
        );
        assert_eq!(
            Error::Api {
                status: 422,
                payload: json!("bad input")
            }
            .to_string(),
            r#"request failed with status 422: "bad input""#
        );
        assert_eq!(
            Error::Network("refused".to_string()).to_string(),
            "network error: refused"
        );
        assert_eq!(
            Error::Configuration("api.base_url is empty".to_string()).to_string(),
            "configuration error: api.base_url is empty"
        );
    }

    #[test]
    fn test_requires_login() {
        assert!(Error::from(RefreshFailure::NoRefreshToken).requires_login());
        assert!(!Error::Unauthorized(Value::Null).requires_login());
        assert!(!Error::Network("x".to_string()).requires_login());
    }
}
